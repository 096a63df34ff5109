//! Query Builder WHERE clause operations
//!
//! Every call appends one condition; the list is AND-combined when rendered.

use super::builder::QueryBuilder;
use super::condition::{self, Queryable};
use crate::backends::DatabaseValue;
use crate::error::OrmError;

impl QueryBuilder {
    /// Add a WHERE condition
    ///
    /// An `IN` with no values is collected as an error.
    pub fn where_cond(mut self, condition: Queryable) -> Self {
        if condition.has_empty_in_list() {
            return self.record_error(OrmError::Query(format!(
                "IN list without values in '{}'",
                condition
            )));
        }
        if condition.is_empty() {
            return self;
        }
        self.where_conditions.push(condition);
        self.cache.where_clause.take();
        self
    }

    /// Add WHERE condition with equality
    pub fn where_eq(self, column: Queryable, value: impl Into<Queryable>) -> Self {
        self.where_cond(condition::eq(column, value))
    }

    /// Add WHERE condition with not equal
    pub fn where_ne(self, column: Queryable, value: impl Into<Queryable>) -> Self {
        self.where_cond(condition::ne(column, value))
    }

    /// Add WHERE condition with greater than
    pub fn where_gt(self, column: Queryable, value: impl Into<Queryable>) -> Self {
        self.where_cond(condition::gt(column, value))
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte(self, column: Queryable, value: impl Into<Queryable>) -> Self {
        self.where_cond(condition::ge(column, value))
    }

    /// Add WHERE condition with less than
    pub fn where_lt(self, column: Queryable, value: impl Into<Queryable>) -> Self {
        self.where_cond(condition::lt(column, value))
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte(self, column: Queryable, value: impl Into<Queryable>) -> Self {
        self.where_cond(condition::le(column, value))
    }

    /// Add WHERE condition with IN
    pub fn where_in<V, I>(self, column: Queryable, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        self.where_cond(condition::in_list(column, values))
    }

    /// Add a negated WHERE condition
    pub fn where_not(self, inner: Queryable) -> Self {
        self.where_cond(condition::not(inner))
    }
}
