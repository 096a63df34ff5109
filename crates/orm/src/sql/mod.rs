//! SQL placeholder handling
//!
//! Statements are rendered with named placeholders (`@const_x1y2`, `:id`) and
//! rebound to the driver's positional syntax right before execution.

use std::collections::HashMap;

use crate::backends::{DatabaseValue, SqlDialect};
use crate::error::{OrmError, OrmResult};

/// A named bind value produced by bound-mode rendering
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    pub name: String,
    pub value: DatabaseValue,
}

impl NamedArg {
    pub fn new(name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Replace named placeholders with the dialect's positional ones
///
/// Returns the rewritten SQL and the bind values in placeholder order. Text
/// inside quotes is left alone, as are PostgreSQL `::type` casts. Two args
/// with the same name are rejected.
pub fn rebind(sql: &str, args: &[NamedArg], dialect: SqlDialect) -> OrmResult<(String, Vec<DatabaseValue>)> {
    let mut lookup: HashMap<&str, &DatabaseValue> = HashMap::with_capacity(args.len());
    for arg in args {
        if lookup.insert(arg.name.as_str(), &arg.value).is_some() {
            return Err(OrmError::Query(format!(
                "Bind value for '{}' supplied more than once",
                arg.name
            )));
        }
    }

    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '@' | ':' if is_placeholder_start(&chars, i) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = lookup.get(name.as_str()).ok_or_else(|| {
                    OrmError::Query(format!("No bind value supplied for placeholder '{}{}'", c, name))
                })?;
                out.push_str(&dialect.parameter_placeholder(values.len()));
                values.push((*value).clone());
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok((out, values))
}

fn is_placeholder_start(chars: &[char], i: usize) -> bool {
    let next_ok = chars
        .get(i + 1)
        .map(|n| n.is_ascii_alphabetic() || *n == '_')
        .unwrap_or(false);
    if !next_ok {
        return false;
    }
    if chars[i] == ':' {
        // `::cast` on either side
        let prev_colon = i > 0 && chars[i - 1] == ':';
        return !prev_colon;
    }
    true
}
