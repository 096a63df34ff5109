//! Model System - Entity registration, cached metadata and persistence
//!
//! - `core_trait`: the `Entity` trait and field metadata
//! - `descriptor`: per-type metadata built once and cached by `TypeId`
//! - `naming`: table-name derivation and column-name guessing
//! - `tracking`: saved-object snapshots used for change detection
//! - `crud_operations`: insert, update, save, delete and lookup by key

pub mod core_trait;
pub mod crud_operations;
pub mod descriptor;
pub mod naming;
pub mod tracking;

pub use core_trait::{table_name_of, Entity, FieldMeta, IdGeneration};
pub use crud_operations::CrudOperations;
pub use descriptor::{descriptor_of, DynEntity, EntityDescriptor};
pub use tracking::{PendingRecord, SavedObjectTracker, Snapshot};

/// Implements `Entity::field_value` and `Entity::set_field` for the listed
/// struct fields
///
/// Each field type must convert into `DatabaseValue` and implement
/// `FromDatabaseValue`.
///
/// ```ignore
/// impl Entity for Post {
///     fn fields() -> Vec<FieldMeta> {
///         vec![FieldMeta::named("id").primary_key(), FieldMeta::named("title")]
///     }
///
///     entity_accessors!(id, title);
/// }
/// ```
#[macro_export]
macro_rules! entity_accessors {
    ($($field:ident),+ $(,)?) => {
        fn field_value(&self, field: &str) -> Option<$crate::backends::DatabaseValue> {
            match field {
                $(stringify!($field) => Some($crate::backends::DatabaseValue::from(self.$field.clone())),)+
                _ => None,
            }
        }

        fn set_field(
            &mut self,
            field: &str,
            value: $crate::backends::DatabaseValue,
        ) -> $crate::error::OrmResult<()> {
            match field {
                $(stringify!($field) => {
                    self.$field = $crate::backends::FromDatabaseValue::from_database_value(value)?;
                    Ok(())
                })+
                other => Err($crate::error::OrmError::Materialization(format!(
                    "'{}' has no field '{}'",
                    <Self as $crate::model::Entity>::type_name(),
                    other
                ))),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::backends::DatabaseValue;

    #[derive(Debug, Clone, Default)]
    struct Reading {
        id: Option<i64>,
        level: f32,
        taken_at: Option<NaiveTime>,
    }

    impl Entity for Reading {
        fn fields() -> Vec<FieldMeta> {
            vec![
                FieldMeta::named("id").primary_key(),
                FieldMeta::named("level"),
                FieldMeta::named("taken_at"),
            ]
        }

        entity_accessors!(id, level, taken_at);
    }

    #[test]
    fn test_accessors_cover_float_and_time_fields() {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let mut reading = Reading::default();
        reading.set_field("level", DatabaseValue::Float32(0.5)).unwrap();
        reading.set_field("taken_at", DatabaseValue::Time(noon)).unwrap();

        assert_eq!(reading.level, 0.5);
        assert_eq!(reading.taken_at, Some(noon));
        assert_eq!(reading.field_value("taken_at"), Some(DatabaseValue::Time(noon)));
        assert!(reading.set_field("level", DatabaseValue::String("high".into())).is_err());
    }
}
