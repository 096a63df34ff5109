//! Query Builder ORDER BY operations

use super::builder::QueryBuilder;
use super::condition::Queryable;
use super::types::{OrderDirection, OrderTerm};

impl QueryBuilder {
    /// Append an ascending ORDER BY term
    ///
    /// Repeated calls accumulate into one ORDER BY clause.
    pub fn order_by(self, expr: Queryable) -> Self {
        self.order_by_direction(expr, OrderDirection::Asc)
    }

    /// Append a descending ORDER BY term
    pub fn order_by_desc(self, expr: Queryable) -> Self {
        self.order_by_direction(expr, OrderDirection::Desc)
    }

    pub fn order_by_direction(mut self, expr: Queryable, direction: OrderDirection) -> Self {
        self.order_by.push(OrderTerm { expr, direction });
        self.cache.options.take();
        self
    }
}
