//! Query Builder SQL generation
//!
//! Statement shape:
//! `SELECT <cols> FROM <t1> <a1> JOIN <t2> <a2> ON <a1>.<c>=<a2>.<c> [WHERE (..) AND (..)] [ORDER BY ..] [LIMIT n] [OFFSET n]`

use super::builder::QueryBuilder;
use super::condition::{and, Queryable};
use super::types::Rendered;
use crate::error::{OrmError, OrmResult};
use crate::relationships::plan_joins;

impl QueryBuilder {
    /// Bound-mode statement text, with aliased tables and named placeholders
    pub fn to_sql(&self) -> OrmResult<String> {
        Ok(self.build_query()?.sql)
    }

    /// Statement text followed by its bind values, without executing
    ///
    /// Rendering is cached, so repeated calls without an intervening mutation
    /// return identical text, parameter names included.
    pub fn print_query(&self) -> OrmResult<String> {
        let query = self.build_query()?;
        if query.args.is_empty() {
            return Ok(query.sql);
        }
        let args = query
            .args
            .iter()
            .map(|arg| format!("@{}={}", arg.name, arg.value.to_sql_literal()))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("{}\nargs: [{}]", query.sql, args))
    }

    /// Statement as shown by `to_sql`/`print_query`
    pub(crate) fn build_query(&self) -> OrmResult<Rendered> {
        self.ensure_valid()?;
        let select = self.select_clause();
        let from = self.from_clause()?;
        Ok(self.assemble(select, from))
    }

    /// Statement as executed: every projected column is named `alias_column`
    pub(crate) fn build_execution_query(&self) -> OrmResult<Rendered> {
        self.ensure_valid()?;
        let select = self.expanded_select_clause();
        let from = self.from_clause()?;
        Ok(self.assemble(&select, from))
    }

    /// `SELECT COUNT(*)` over the same FROM and WHERE, ignoring options
    pub(crate) fn build_count_query(&self) -> OrmResult<Rendered> {
        self.ensure_valid()?;
        let from = self.from_clause()?;
        let where_clause = self.where_clause();
        Ok(Rendered::new(
            format!("SELECT COUNT(*) FROM {}{}", from.sql, where_clause.sql),
            where_clause.args.clone(),
        ))
    }

    fn assemble(&self, select: &Rendered, from: &Rendered) -> Rendered {
        let where_clause = self.where_clause();
        let options = self.options_clause();

        let sql = format!(
            "SELECT {} FROM {}{}{}",
            select.sql, from.sql, where_clause.sql, options.sql
        );
        let mut args = select.args.clone();
        args.extend(where_clause.args.iter().cloned());
        args.extend(options.args.iter().cloned());
        Rendered::new(sql, args)
    }

    fn select_clause(&self) -> &Rendered {
        self.cache.select.get_or_init(|| {
            if self.select_exprs.is_empty() {
                let sql = self
                    .aliases
                    .aliases()
                    .map(|(alias, _)| format!("{}.*", alias))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Rendered::text(sql);
            }
            self.render_select_list(&self.select_exprs)
        })
    }

    /// Select list with each joined entity's `*` spelled out from metadata
    fn expanded_select_clause(&self) -> Rendered {
        let defaults;
        let exprs = if self.select_exprs.is_empty() {
            defaults = self
                .aliases
                .aliases()
                .map(|(_, table)| Queryable::AllColumns {
                    table: table.to_string(),
                })
                .collect::<Vec<_>>();
            &defaults
        } else {
            &self.select_exprs
        };

        let mut sql = Vec::new();
        let mut args = Vec::new();
        for expr in exprs {
            match expr {
                Queryable::AllColumns { table } => match self.expand_all_columns(table) {
                    Some(columns) => sql.extend(columns),
                    None => sql.push(format!("{}.*", table)),
                },
                other => {
                    let rendered = self.render_select_item(other);
                    sql.push(rendered.sql);
                    args.extend(rendered.args);
                }
            }
        }
        Rendered::new(sql.join(", "), args)
    }

    fn expand_all_columns(&self, table: &str) -> Option<Vec<String>> {
        let alias = self.aliases.alias_for_table(table)?;
        let descriptor = self.aliases.descriptor_for_alias(alias)?;
        let columns = descriptor
            .fields()
            .iter()
            .filter_map(|field| {
                let source = match field.foreign_table {
                    // foreign fields are only readable when their table is joined
                    Some(foreign) => self.aliases.alias_for_table(foreign)?,
                    None => alias,
                };
                Some(format!("{}.{} AS {}_{}", source, field.column, alias, field.column))
            })
            .collect();
        Some(columns)
    }

    fn render_select_list(&self, exprs: &[Queryable]) -> Rendered {
        let mut sql = Vec::with_capacity(exprs.len());
        let mut args = Vec::new();
        for expr in exprs {
            let rendered = self.render_select_item(expr);
            sql.push(rendered.sql);
            args.extend(rendered.args);
        }
        Rendered::new(sql.join(", "), args)
    }

    fn render_select_item(&self, expr: &Queryable) -> Rendered {
        if let Queryable::TableColumn { table, column } = expr {
            if let Some(alias) = self.aliases.alias_for_table(table) {
                return Rendered::text(format!("{}.{} AS {}_{}", alias, column, alias, column));
            }
        }
        let (sql, args) = expr.query_value(&self.aliases);
        Rendered::new(sql, args)
    }

    fn from_clause(&self) -> OrmResult<&Rendered> {
        self.cache.from.get_or_try_init(|| {
            let entities = self.aliases.entities();
            let alias_of = |table: &str| {
                self.aliases.alias_for_table(table).ok_or_else(|| {
                    OrmError::Query(format!("Table '{}' has no alias in this query", table))
                })
            };

            match entities {
                [] => Err(OrmError::Query("No entities joined".to_string())),
                [only] => Ok(Rendered::text(format!(
                    "{} {}",
                    only.table(),
                    alias_of(only.table())?
                ))),
                _ => {
                    let edges = plan_joins(entities)?;
                    let mut sql = String::new();
                    for (i, edge) in edges.iter().enumerate() {
                        let from_alias = alias_of(&edge.self_table)?;
                        let to_alias = alias_of(&edge.target_table)?;
                        if i == 0 {
                            sql.push_str(&format!("{} {} ", edge.self_table, from_alias));
                        } else {
                            sql.push(' ');
                        }
                        sql.push_str(&format!(
                            "JOIN {} {} ON {}.{}={}.{}",
                            edge.target_table,
                            to_alias,
                            from_alias,
                            edge.self_column,
                            to_alias,
                            edge.target_column
                        ));
                    }
                    Ok(Rendered::text(sql))
                }
            }
        })
    }

    fn where_clause(&self) -> &Rendered {
        self.cache.where_clause.get_or_init(|| {
            if self.where_conditions.is_empty() {
                return Rendered::default();
            }
            let combined = and(self.where_conditions.iter().cloned());
            let (sql, args) = combined.query_value(&self.aliases);
            Rendered::new(format!(" WHERE {}", sql), args)
        })
    }

    fn options_clause(&self) -> &Rendered {
        self.cache.options.get_or_init(|| {
            let mut sql = String::new();
            let mut args = Vec::new();

            if !self.order_by.is_empty() {
                sql.push_str(" ORDER BY ");
                for (i, term) in self.order_by.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    let (expr, expr_args) = term.expr.query_value(&self.aliases);
                    sql.push_str(&format!("{} {}", expr, term.direction));
                    args.extend(expr_args);
                }
            }

            if let Some(limit) = self.limit_count {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            if let Some(offset) = self.offset_value {
                sql.push_str(&format!(" OFFSET {}", offset));
            }

            Rendered::new(sql, args)
        })
    }
}
