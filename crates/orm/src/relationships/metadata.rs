//! Relationship metadata: a directed column-to-column link between two tables

use serde::{Deserialize, Serialize};

use crate::model::{table_name_of, Entity};

/// `(self_table, self_column) joins-to (target_table, target_column)`
///
/// A relationship means the same thing whichever side declares it; the join
/// planner inverts it when only the reverse direction is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub self_table: String,
    pub self_column: String,
    pub target_table: String,
    pub target_column: String,
}

impl Relationship {
    pub fn new(
        self_table: impl Into<String>,
        self_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            self_table: self_table.into(),
            self_column: self_column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        }
    }

    /// Relationship from `S.self_column` to `T.target_column`, with both table
    /// names resolved from the entity types
    pub fn between<S: Entity, T: Entity>(self_column: &str, target_column: &str) -> Self {
        Self::new(
            table_name_of::<S>(),
            self_column,
            table_name_of::<T>(),
            target_column,
        )
    }

    /// Same link expressed from the other side
    pub fn inverted(&self) -> Self {
        Self {
            self_table: self.target_table.clone(),
            self_column: self.target_column.clone(),
            target_table: self.self_table.clone(),
            target_column: self.self_column.clone(),
        }
    }
}
