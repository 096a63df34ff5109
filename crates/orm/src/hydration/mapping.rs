//! Column mapping - result column names back onto joined entity fields
//!
//! Executed queries name every projected column `{alias}_{column}`. The alias
//! picks the entity, the column picks the field (exact tag first, then a
//! loose name guess).

use tracing::trace;

use crate::error::{OrmError, OrmResult};
use crate::query::AliasTable;

/// Split `a_created_at` into `("a", "created_at")`
///
/// Aliases never contain `_`, so the first underscore is the separator.
pub fn parse_column_alias(column: &str) -> Option<(&str, &str)> {
    let (alias, name) = column.split_once('_')?;
    if alias.is_empty() || name.is_empty() || !alias.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((alias, name))
}

/// `{alias}_{column}`
pub fn column_alias(alias: &str, column: &str) -> String {
    format!("{}_{}", alias, column)
}

/// Destination of one result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnTarget {
    /// Position of the entity in join order
    pub(crate) entity: usize,
    pub(crate) field: &'static str,
}

/// Resolve every result column to an entity field
///
/// Bare column names are only accepted when a single entity is joined.
pub(crate) fn plan_columns(columns: &[String], aliases: &AliasTable) -> OrmResult<Vec<ColumnTarget>> {
    let entities = aliases.entities();
    columns
        .iter()
        .map(|column| {
            if let Some((alias, name)) = parse_column_alias(column) {
                if let Some(descriptor) = aliases.descriptor_for_alias(alias) {
                    let field = descriptor.resolve_column(name).ok_or_else(|| {
                        OrmError::Materialization(format!(
                            "Column '{}' does not map to any field of '{}'",
                            column,
                            descriptor.type_name()
                        ))
                    })?;
                    let entity = entities
                        .iter()
                        .position(|d| d.type_id() == descriptor.type_id())
                        .unwrap_or_default();
                    trace!(column = %column, entity = descriptor.type_name(), field = field.name, "column mapped");
                    return Ok(ColumnTarget {
                        entity,
                        field: field.name,
                    });
                }
            }

            match entities {
                [only] => only
                    .resolve_column(column)
                    .map(|field| ColumnTarget {
                        entity: 0,
                        field: field.name,
                    })
                    .ok_or_else(|| {
                        OrmError::Materialization(format!(
                            "Column '{}' does not map to any field of '{}'",
                            column,
                            only.type_name()
                        ))
                    }),
                _ => Err(OrmError::Materialization(format!(
                    "Column '{}' does not name a joined alias",
                    column
                ))),
            }
        })
        .collect()
}
