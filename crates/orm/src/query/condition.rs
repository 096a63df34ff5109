//! Condition Model - composable where/select/order expressions
//!
//! Every [`Queryable`] renders in two modes:
//!
//! - literal (`Display`): values inlined as SQL literals, table names kept
//!   as written. Used for debugging.
//! - bound ([`Queryable::query_value`]): every constant becomes a freshly
//!   named `@const_<random>` placeholder and tables are replaced by their
//!   alias. Used for execution.
//!
//! Both modes produce the same SQL shape.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::alias::AliasTable;
use crate::backends::DatabaseValue;
use crate::model::{table_name_of, Entity};
use crate::sql::NamedArg;

const PARAM_SUFFIX_LEN: usize = 10;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "="),
            ComparisonOp::Ne => write!(f, "!="),
            ComparisonOp::Gt => write!(f, ">"),
            ComparisonOp::Lt => write!(f, "<"),
            ComparisonOp::Ge => write!(f, ">="),
            ComparisonOp::Le => write!(f, "<="),
            ComparisonOp::In => write!(f, "IN"),
        }
    }
}

/// Multi-child combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
    Comma,
}

impl Combinator {
    fn separator(&self) -> &'static str {
        match self {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
            Combinator::Comma => ", ",
        }
    }

    /// AND/OR parenthesize each child; comma lists do not
    fn wraps_children(&self) -> bool {
        !matches!(self, Combinator::Comma)
    }
}

/// Condition node
#[derive(Debug, Clone, PartialEq)]
pub enum Queryable {
    Constant(DatabaseValue),
    /// Comma-separated constants, each bound separately
    List(Vec<DatabaseValue>),
    /// Bare column name
    Column(String),
    TableColumn { table: String, column: String },
    /// `table.*`
    AllColumns { table: String },
    Comparison {
        op: ComparisonOp,
        lhs: Box<Queryable>,
        rhs: Box<Queryable>,
    },
    Combination {
        op: Combinator,
        children: Vec<Queryable>,
    },
    Not(Box<Queryable>),
}

enum Mode<'a> {
    Literal,
    Bound {
        aliases: &'a AliasTable,
        args: Vec<NamedArg>,
    },
}

impl Queryable {
    /// Bound-mode rendering: aliased text plus its bind values
    ///
    /// Constant names are regenerated on every call.
    pub fn query_value(&self, aliases: &AliasTable) -> (String, Vec<NamedArg>) {
        let mut mode = Mode::Bound {
            aliases,
            args: Vec::new(),
        };
        let mut out = String::new();
        self.render(&mut mode, &mut out);
        match mode {
            Mode::Bound { args, .. } => (out, args),
            Mode::Literal => (out, Vec::new()),
        }
    }

    fn render(&self, mode: &mut Mode<'_>, out: &mut String) {
        match self {
            Queryable::Constant(value) => render_constant(value, mode, out),
            Queryable::List(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    render_constant(value, mode, out);
                }
            }
            Queryable::Column(column) => out.push_str(column),
            Queryable::TableColumn { table, column } => {
                out.push_str(table_reference(table, mode));
                out.push('.');
                out.push_str(column);
            }
            Queryable::AllColumns { table } => {
                out.push_str(table_reference(table, mode));
                out.push_str(".*");
            }
            Queryable::Comparison { op, lhs, rhs } => {
                lhs.render(mode, out);
                out.push(' ');
                out.push_str(&op.to_string());
                out.push(' ');
                if *op == ComparisonOp::In {
                    out.push('(');
                    rhs.render(mode, out);
                    out.push(')');
                } else {
                    rhs.render(mode, out);
                }
            }
            Queryable::Combination { op, children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push_str(op.separator());
                    }
                    if op.wraps_children() {
                        out.push('(');
                        child.render(mode, out);
                        out.push(')');
                    } else {
                        child.render(mode, out);
                    }
                }
            }
            Queryable::Not(child) => {
                let mut inner = String::new();
                child.render(mode, &mut inner);
                out.push_str("NOT ");
                if is_wrapped(&inner) {
                    out.push_str(&inner);
                } else {
                    out.push('(');
                    out.push_str(&inner);
                    out.push(')');
                }
            }
        }
    }

    /// True when some `IN` comparison has an empty value list, which neither
    /// dialect accepts
    pub fn has_empty_in_list(&self) -> bool {
        match self {
            Queryable::Comparison { op, rhs, .. } => {
                (*op == ComparisonOp::In && matches!(rhs.as_ref(), Queryable::List(values) if values.is_empty()))
                    || rhs.has_empty_in_list()
            }
            Queryable::Combination { children, .. } => children.iter().any(Queryable::has_empty_in_list),
            Queryable::Not(child) => child.has_empty_in_list(),
            _ => false,
        }
    }

    /// True for nodes with nothing to render, such as an empty AND
    pub fn is_empty(&self) -> bool {
        match self {
            Queryable::Combination { children, .. } => children.iter().all(Queryable::is_empty),
            Queryable::List(values) => values.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Queryable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut Mode::Literal, &mut out);
        f.write_str(&out)
    }
}

fn render_constant(value: &DatabaseValue, mode: &mut Mode<'_>, out: &mut String) {
    match mode {
        Mode::Literal => out.push_str(&value.to_sql_literal()),
        Mode::Bound { args, .. } => {
            let name = fresh_param_name();
            out.push('@');
            out.push_str(&name);
            args.push(NamedArg::new(name, value.clone()));
        }
    }
}

fn table_reference<'t>(table: &'t str, mode: &Mode<'t>) -> &'t str {
    match mode {
        Mode::Literal => table,
        Mode::Bound { aliases, .. } => aliases.alias_for_table(table).unwrap_or(table),
    }
}

fn fresh_param_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PARAM_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("const_{}", suffix)
}

/// Whether the whole text is enclosed by one pair of parentheses
fn is_wrapped(text: &str) -> bool {
    if !text.starts_with('(') || !text.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

macro_rules! constant_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Queryable {
                fn from(value: $ty) -> Self {
                    Queryable::Constant(DatabaseValue::from(value))
                }
            }
        )+
    };
}

constant_from!(
    bool,
    i32,
    i64,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    Uuid,
    DateTime<Utc>,
    NaiveDate,
    JsonValue,
);

impl From<DatabaseValue> for Queryable {
    fn from(value: DatabaseValue) -> Self {
        Queryable::Constant(value)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for Queryable {
    fn from(value: Option<T>) -> Self {
        Queryable::Constant(value.map(Into::into).unwrap_or(DatabaseValue::Null))
    }
}

/// `E`'s table qualified column
pub fn column<E: Entity>(column: &str) -> Queryable {
    Queryable::TableColumn {
        table: table_name_of::<E>(),
        column: column.to_string(),
    }
}

/// Column of an arbitrary table, aliased if the table is joined
pub fn table_column(table: &str, column: &str) -> Queryable {
    Queryable::TableColumn {
        table: table.to_string(),
        column: column.to_string(),
    }
}

/// Bare, unqualified column name
pub fn col(name: &str) -> Queryable {
    Queryable::Column(name.to_string())
}

/// `E`'s `table.*`
pub fn all_columns<E: Entity>() -> Queryable {
    Queryable::AllColumns {
        table: table_name_of::<E>(),
    }
}

pub fn value(value: impl Into<DatabaseValue>) -> Queryable {
    Queryable::Constant(value.into())
}

fn comparison(op: ComparisonOp, lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    Queryable::Comparison {
        op,
        lhs: Box::new(lhs.into()),
        rhs: Box::new(rhs.into()),
    }
}

pub fn eq(lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    comparison(ComparisonOp::Eq, lhs, rhs)
}

pub fn ne(lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    comparison(ComparisonOp::Ne, lhs, rhs)
}

pub fn gt(lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    comparison(ComparisonOp::Gt, lhs, rhs)
}

pub fn lt(lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    comparison(ComparisonOp::Lt, lhs, rhs)
}

pub fn ge(lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    comparison(ComparisonOp::Ge, lhs, rhs)
}

pub fn le(lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    comparison(ComparisonOp::Le, lhs, rhs)
}

/// `lhs IN (v1, v2, ...)`
pub fn in_list<V, I>(lhs: impl Into<Queryable>, values: I) -> Queryable
where
    I: IntoIterator<Item = V>,
    V: Into<DatabaseValue>,
{
    comparison(
        ComparisonOp::In,
        lhs,
        Queryable::List(values.into_iter().map(Into::into).collect()),
    )
}

/// `lhs IN (<rhs>)` for an arbitrary right-hand side, e.g. a raw sub-select
pub fn in_expr(lhs: impl Into<Queryable>, rhs: impl Into<Queryable>) -> Queryable {
    comparison(ComparisonOp::In, lhs, rhs)
}

pub fn and(children: impl IntoIterator<Item = Queryable>) -> Queryable {
    Queryable::Combination {
        op: Combinator::And,
        children: children.into_iter().collect(),
    }
}

pub fn or(children: impl IntoIterator<Item = Queryable>) -> Queryable {
    Queryable::Combination {
        op: Combinator::Or,
        children: children.into_iter().collect(),
    }
}

pub fn comma(children: impl IntoIterator<Item = Queryable>) -> Queryable {
    Queryable::Combination {
        op: Combinator::Comma,
        children: children.into_iter().collect(),
    }
}

pub fn not(child: impl Into<Queryable>) -> Queryable {
    Queryable::Not(Box::new(child.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_accessors;
    use crate::model::FieldMeta;

    #[derive(Debug, Clone, Default)]
    struct Testtable1 {
        foo: i32,
    }

    impl Entity for Testtable1 {
        fn table_name_override() -> Option<&'static str> {
            Some("testtable1")
        }

        fn fields() -> Vec<FieldMeta> {
            vec![FieldMeta::named("foo")]
        }

        entity_accessors!(foo);
    }

    #[derive(Debug, Clone, Default)]
    struct Testtable2 {
        bar: i32,
    }

    impl Entity for Testtable2 {
        fn table_name_override() -> Option<&'static str> {
            Some("testtable2")
        }

        fn fields() -> Vec<FieldMeta> {
            vec![FieldMeta::named("bar")]
        }

        entity_accessors!(bar);
    }

    fn scenario() -> Queryable {
        and([
            eq(column::<Testtable1>("foo"), 1),
            in_list(column::<Testtable2>("bar"), [2, 3, 4]),
        ])
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(
            scenario().to_string(),
            "(testtable1.foo = 1) AND (testtable2.bar IN (2, 3, 4))"
        );
        assert_eq!(eq(col("name"), "o'brien").to_string(), "name = 'o''brien'");
    }

    #[test]
    fn test_bound_rendering_uses_aliases_and_placeholders() {
        let mut aliases = AliasTable::new();
        aliases.add::<Testtable1>().unwrap();

        let (sql, args) = scenario().query_value(&aliases);
        assert!(sql.starts_with("(a.foo = @const_"));
        // unjoined tables keep their name
        assert!(sql.contains("testtable2.bar IN (@const_"));
        assert_eq!(args.len(), 4);
        assert_eq!(args[0].value, DatabaseValue::Int32(1));
        assert_eq!(args[3].value, DatabaseValue::Int32(4));
        for arg in &args {
            assert!(sql.contains(&format!("@{}", arg.name)));
            assert_eq!(arg.name.len(), "const_".len() + PARAM_SUFFIX_LEN);
        }
    }

    #[test]
    fn test_rerendering_renames_parameters_only() {
        let condition = eq(col("id"), 7);
        let aliases = AliasTable::new();
        let (first, first_args) = condition.query_value(&aliases);
        let (second, second_args) = condition.query_value(&aliases);

        assert_ne!(first_args[0].name, second_args[0].name);
        assert_ne!(first, second);
        assert_eq!(condition.to_string(), condition.to_string());
    }

    #[test]
    fn test_not_parenthesizes_only_when_needed() {
        assert_eq!(not(eq(col("a"), 1)).to_string(), "NOT (a = 1)");
        assert_eq!(not(and([eq(col("a"), 1)])).to_string(), "NOT (a = 1)");
        assert_eq!(
            not(and([eq(col("a"), 1), eq(col("b"), 2)])).to_string(),
            "NOT ((a = 1) AND (b = 2))"
        );
    }

    #[test]
    fn test_other_combinators() {
        assert_eq!(
            or([lt(col("a"), 1), ge(col("b"), 2)]).to_string(),
            "(a < 1) OR (b >= 2)"
        );
        assert_eq!(comma([col("a"), col("b")]).to_string(), "a, b");
        assert_eq!(ne(col("a"), Option::<i32>::None).to_string(), "a != NULL");
        assert!(and(Vec::new()).is_empty());
    }
}
