//! Query Builder - Core builder implementation
//!
//! Mutators take and return the builder by value. Failures are collected
//! rather than raised, and surface once the query is rendered or executed.

use std::sync::Arc;

use tracing::debug;

use super::alias::AliasTable;
use super::condition::Queryable;
use super::types::*;
use crate::error::{OrmError, OrmResult};
use crate::model::{descriptor_of, Entity, EntityDescriptor};

/// Query builder for multi-entity SELECT statements
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(crate) aliases: AliasTable,
    pub(crate) select_exprs: Vec<Queryable>,
    pub(crate) where_conditions: Vec<Queryable>,
    pub(crate) order_by: Vec<OrderTerm>,
    pub(crate) limit_count: Option<u64>,
    pub(crate) offset_value: Option<u64>,
    pub(crate) errors: Vec<OrmError>,
    pub(crate) cache: ClauseCache,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `E` to the query, aliasing its table
    pub fn join<E: Entity>(self) -> Self {
        match descriptor_of::<E>() {
            Ok(descriptor) => self.join_descriptor(descriptor),
            Err(err) => self.record_error(err),
        }
    }

    /// Add an already-resolved entity to the query
    pub fn join_descriptor(mut self, descriptor: Arc<EntityDescriptor>) -> Self {
        let entity = descriptor.type_name();
        match self.aliases.add_descriptor(descriptor) {
            Ok(alias) => {
                debug!(entity, alias = %alias, "entity joined");
                // aliases feed every clause
                self.cache.clear();
                self
            }
            Err(err) => self.record_error(err),
        }
    }

    pub(crate) fn record_error(mut self, err: OrmError) -> Self {
        debug!(error = %err, "query builder error collected");
        self.errors.push(err);
        self
    }

    /// Alias table shared by every clause of this query
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Errors collected so far
    pub fn errors(&self) -> &[OrmError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Refuse to go further when any mutation failed
    pub(crate) fn ensure_valid(&self) -> OrmResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(OrmError::Builder(self.errors.clone()))
        }
    }
}
