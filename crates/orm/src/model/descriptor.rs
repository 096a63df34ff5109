//! Entity descriptors - per-type metadata built once and cached by `TypeId`

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use super::core_trait::{table_name_of, Entity, FieldMeta, IdGeneration};
use super::naming::guess_key;
use crate::backends::DatabaseValue;
use crate::error::{OrmError, OrmResult};
use crate::relationships::Relationship;

static DESCRIPTORS: Lazy<DashMap<TypeId, Arc<EntityDescriptor>>> = Lazy::new(DashMap::new);

/// Object-safe view of an entity instance
pub trait DynEntity: Any + Send + Sync {
    fn field_value_dyn(&self, field: &str) -> Option<DatabaseValue>;
    fn set_field_dyn(&mut self, field: &str, value: DatabaseValue) -> OrmResult<()>;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<E: Entity> DynEntity for E {
    fn field_value_dyn(&self, field: &str) -> Option<DatabaseValue> {
        self.field_value(field)
    }

    fn set_field_dyn(&mut self, field: &str, value: DatabaseValue) -> OrmResult<()> {
        self.set_field(field, value)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

fn construct<E: Entity>() -> Box<dyn DynEntity> {
    Box::new(E::default())
}

/// Everything the engine needs to know about one entity type
pub struct EntityDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    table: String,
    fields: Vec<FieldMeta>,
    by_column: HashMap<&'static str, usize>,
    by_guess: HashMap<String, usize>,
    primary_keys: Vec<usize>,
    relationships: Option<Vec<Relationship>>,
    id_generation: IdGeneration,
    constructor: fn() -> Box<dyn DynEntity>,
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("fields", &self.fields)
            .field("relationships", &self.relationships)
            .field("id_generation", &self.id_generation)
            .finish()
    }
}

/// Cached descriptor for `E`, building it on first use
pub fn descriptor_of<E: Entity>() -> OrmResult<Arc<EntityDescriptor>> {
    let type_id = TypeId::of::<E>();
    if let Some(existing) = DESCRIPTORS.get(&type_id) {
        return Ok(Arc::clone(existing.value()));
    }

    let built = Arc::new(EntityDescriptor::build::<E>()?);
    debug!(entity = built.type_name, table = %built.table, "entity descriptor built");
    Ok(Arc::clone(DESCRIPTORS.entry(type_id).or_insert(built).value()))
}

impl EntityDescriptor {
    fn build<E: Entity>() -> OrmResult<Self> {
        let type_name = E::type_name();
        let table = table_name_of::<E>();
        if table.trim().is_empty() {
            return Err(OrmError::Metadata(format!(
                "Entity '{}' has no resolvable table name",
                type_name
            )));
        }

        let fields = E::fields();
        if fields.is_empty() {
            return Err(OrmError::Metadata(format!(
                "Entity '{}' declares no persisted fields",
                type_name
            )));
        }

        let mut by_column = HashMap::new();
        let mut by_guess = HashMap::new();
        let mut primary_keys = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            if field.column.is_empty() {
                return Err(OrmError::Metadata(format!(
                    "Field '{}' on '{}' has an empty column tag",
                    field.name, type_name
                )));
            }
            if by_column.insert(field.column, index).is_some() {
                return Err(OrmError::Metadata(format!(
                    "Column '{}' is mapped twice on '{}'",
                    field.column, type_name
                )));
            }
            by_guess.entry(guess_key(field.name)).or_insert(index);
            if field.primary_key {
                primary_keys.push(index);
            }
        }

        Ok(Self {
            type_id: TypeId::of::<E>(),
            type_name,
            table,
            fields,
            by_column,
            by_guess,
            primary_keys,
            relationships: E::relationships(),
            id_generation: E::id_generation(),
            constructor: construct::<E>,
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn relationships(&self) -> Option<&[Relationship]> {
        self.relationships.as_deref()
    }

    pub fn id_generation(&self) -> IdGeneration {
        self.id_generation
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &FieldMeta> {
        self.primary_keys.iter().map(move |&i| &self.fields[i])
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    /// Field tagged with exactly this column
    pub fn field_for_column(&self, column: &str) -> Option<&FieldMeta> {
        self.by_column.get(column).map(|&i| &self.fields[i])
    }

    /// Field for a result column: exact tag first, then a name guess that
    /// ignores case and underscores
    pub fn resolve_column(&self, column: &str) -> Option<&FieldMeta> {
        self.field_for_column(column)
            .or_else(|| self.by_guess.get(&guess_key(column)).map(|&i| &self.fields[i]))
    }

    /// Fresh default instance, used by the materializer
    pub fn instantiate(&self) -> Box<dyn DynEntity> {
        (self.constructor)()
    }

    /// Column → value for every writable field of an instance
    pub fn snapshot(&self, entity: &dyn DynEntity) -> HashMap<String, DatabaseValue> {
        self.fields
            .iter()
            .filter(|field| field.is_writable())
            .map(|field| {
                let value = entity.field_value_dyn(field.name).unwrap_or(DatabaseValue::Null);
                (field.column.to_string(), value)
            })
            .collect()
    }

    /// Primary key values in declaration order, or `None` if any is NULL
    pub fn key_values(&self, entity: &dyn DynEntity) -> Option<Vec<(&'static str, DatabaseValue)>> {
        if self.primary_keys.is_empty() {
            return None;
        }
        self.primary_keys()
            .map(|field| match entity.field_value_dyn(field.name) {
                Some(value) if !value.is_null() => Some((field.column, value)),
                _ => None,
            })
            .collect()
    }
}
