//! Core Entity Trait - Registration surface for persistable types
//!
//! An entity declares its table, its persisted fields with their column tags,
//! its relationships and its id-generation capability. Field access goes
//! through `field_value`/`set_field` so the engine never needs reflection.

use crate::backends::DatabaseValue;
use crate::error::OrmResult;
use crate::model::naming::{derive_table_name, short_type_name};
use crate::relationships::Relationship;

/// How an entity's primary key gets its value on insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdGeneration {
    /// Caller sets the key before saving
    #[default]
    Manual,
    /// Database assigns the key; a NULL key column is omitted from INSERT and
    /// read back afterwards
    Database,
    /// `Entity::generate_id` is consulted when the key is NULL
    Application,
}

/// Persisted field: Rust field name, column tag and optional foreign table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub column: &'static str,
    /// Column is read from another joined table rather than this entity's own
    pub foreign_table: Option<&'static str>,
    pub primary_key: bool,
}

impl FieldMeta {
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            foreign_table: None,
            primary_key: false,
        }
    }

    /// Field whose column tag equals its name
    pub const fn named(name: &'static str) -> Self {
        Self::new(name, name)
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn from_table(mut self, table: &'static str) -> Self {
        self.foreign_table = Some(table);
        self
    }

    /// Whether INSERT/UPDATE write this column
    pub fn is_writable(&self) -> bool {
        self.foreign_table.is_none()
    }
}

/// Core trait for persistable entities
pub trait Entity: Clone + Default + Send + Sync + 'static {
    /// Type name used for table-name derivation
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Explicit table name; takes precedence over the derived name
    fn table_name_override() -> Option<&'static str> {
        None
    }

    /// Persisted fields in declaration order
    fn fields() -> Vec<FieldMeta>;

    /// Declared relationships, or `None` when the type is not relationship-capable
    fn relationships() -> Option<Vec<Relationship>> {
        None
    }

    fn id_generation() -> IdGeneration {
        IdGeneration::Manual
    }

    /// New key value for `IdGeneration::Application`
    fn generate_id(&self) -> Option<DatabaseValue> {
        None
    }

    /// Current value of a persisted field
    fn field_value(&self, field: &str) -> Option<DatabaseValue>;

    /// Scan a column value into a field
    fn set_field(&mut self, field: &str, value: DatabaseValue) -> OrmResult<()>;

    /// Called before the INSERT statement is built
    fn pre_insert(&mut self) -> OrmResult<()> {
        Ok(())
    }

    /// Called after the INSERT ran and generated keys were scanned back
    fn post_insert(&mut self) -> OrmResult<()> {
        Ok(())
    }
}

/// Resolved table name: the override if present, else the derived one
pub fn table_name_of<E: Entity>() -> String {
    match E::table_name_override() {
        Some(table) => table.to_string(),
        None => derive_table_name(E::type_name()),
    }
}
