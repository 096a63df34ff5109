//! Query Builder SELECT operations

use super::builder::QueryBuilder;
use super::condition::{all_columns, column, Queryable};
use crate::model::Entity;

impl QueryBuilder {
    /// Replace the select list
    ///
    /// Table-qualified columns are emitted as `alias.column AS alias_column`.
    pub fn select<I>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = Queryable>,
    {
        self.select_exprs = exprs.into_iter().collect();
        self.cache.select.take();
        self
    }

    /// Replace the select list with columns of `E`
    pub fn select_columns<E: Entity>(self, columns: &[&str]) -> Self {
        self.select(columns.iter().map(|c| column::<E>(c)))
    }

    /// Replace the select list with `E`'s `alias.*`
    pub fn select_all<E: Entity>(self) -> Self {
        self.select([all_columns::<E>()])
    }

    /// Whether an explicit select list was given
    pub fn has_explicit_select(&self) -> bool {
        !self.select_exprs.is_empty()
    }
}
