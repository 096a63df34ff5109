//! Alias Table - query-scoped single-letter aliases for joined tables
//!
//! Aliases are handed out in join order from `a..z` then `A..Z` and never
//! reassigned. Joining an entity a second time reuses its alias. Only owned
//! entity types can be joined: `join::<E>()` takes a type, so by-value or
//! doubly-indirected instances never reach the table.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::trace;

use crate::error::{OrmError, OrmResult};
use crate::model::{descriptor_of, Entity, EntityDescriptor};

/// Alias alphabet in assignment order
pub const ALIAS_ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Maximum number of distinct tables in one query
pub const MAX_ALIASES: usize = ALIAS_ALPHABET.len();

/// Bijection between aliases and table names, plus type → table lookups
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    by_alias: BTreeMap<String, String>,
    by_table: HashMap<String, String>,
    by_type: HashMap<TypeId, String>,
    entities: Vec<Arc<EntityDescriptor>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias `E`'s table, returning the alias
    pub fn add<E: Entity>(&mut self) -> OrmResult<String> {
        let descriptor = descriptor_of::<E>()?;
        self.add_descriptor(descriptor)
    }

    /// Alias every entity in order, stopping at the first failure
    pub fn add_entities<I>(&mut self, descriptors: I) -> OrmResult<()>
    where
        I: IntoIterator<Item = Arc<EntityDescriptor>>,
    {
        for descriptor in descriptors {
            self.add_descriptor(descriptor)?;
        }
        Ok(())
    }

    /// Alias a resolved entity
    ///
    /// Re-adding the same entity returns its alias. A different entity type
    /// mapped onto an already aliased table is a metadata error, since rows of
    /// that table materialize as one type only.
    pub fn add_descriptor(&mut self, descriptor: Arc<EntityDescriptor>) -> OrmResult<String> {
        let table = descriptor.table().to_string();

        if let Some(alias) = self.by_table.get(&table) {
            if let Some(owner) = self.entities.iter().find(|desc| desc.table() == table) {
                if owner.type_id() != descriptor.type_id() {
                    return Err(OrmError::Metadata(format!(
                        "'{}' and '{}' both map to table '{}'",
                        owner.type_name(),
                        descriptor.type_name(),
                        table
                    )));
                }
            }
            return Ok(alias.clone());
        }

        let next = self.by_alias.len();
        let Some(&symbol) = ALIAS_ALPHABET.get(next) else {
            return Err(OrmError::AliasCapacity {
                limit: MAX_ALIASES,
                table,
            });
        };

        let alias = char::from(symbol).to_string();
        trace!(alias = %alias, table = %table, "table aliased");
        self.by_alias.insert(alias.clone(), table.clone());
        self.by_table.insert(table.clone(), alias.clone());
        self.by_type.insert(descriptor.type_id(), table);
        self.entities.push(descriptor);
        Ok(alias)
    }

    pub fn table_for_alias(&self, alias: &str) -> Option<&str> {
        self.by_alias.get(alias).map(String::as_str)
    }

    pub fn alias_for_table(&self, table: &str) -> Option<&str> {
        self.by_table.get(table).map(String::as_str)
    }

    pub fn table_for_type(&self, type_id: TypeId) -> Option<&str> {
        self.by_type.get(&type_id).map(String::as_str)
    }

    pub fn table_of<E: Entity>(&self) -> Option<&str> {
        self.table_for_type(TypeId::of::<E>())
    }

    pub fn is_aliased<E: Entity>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<E>())
    }

    /// Alias of `E`'s table; an error if `E` was never joined
    pub fn alias_of<E: Entity>(&self) -> OrmResult<&str> {
        self.table_of::<E>()
            .and_then(|table| self.alias_for_table(table))
            .ok_or_else(|| {
                OrmError::Query(format!(
                    "Entity '{}' is not part of this query",
                    E::type_name()
                ))
            })
    }

    pub fn descriptor_for_alias(&self, alias: &str) -> Option<&Arc<EntityDescriptor>> {
        let table = self.table_for_alias(alias)?;
        self.entities.iter().find(|desc| desc.table() == table)
    }

    /// `(alias, table)` pairs sorted by alias byte order, so every
    /// uppercase alias sorts before every lowercase one
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_alias
            .iter()
            .map(|(alias, table)| (alias.as_str(), table.as_str()))
    }

    /// Aliased entities in join order
    pub fn entities(&self) -> &[Arc<EntityDescriptor>] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DatabaseValue;
    use crate::model::FieldMeta;

    const TABLES: [&str; 53] = [
        "t00", "t01", "t02", "t03", "t04", "t05", "t06", "t07", "t08", "t09", "t10", "t11", "t12",
        "t13", "t14", "t15", "t16", "t17", "t18", "t19", "t20", "t21", "t22", "t23", "t24", "t25",
        "t26", "t27", "t28", "t29", "t30", "t31", "t32", "t33", "t34", "t35", "t36", "t37", "t38",
        "t39", "t40", "t41", "t42", "t43", "t44", "t45", "t46", "t47", "t48", "t49", "t50", "t51",
        "t52",
    ];

    #[derive(Debug, Clone, Default)]
    struct Numbered<const N: usize>;

    impl<const N: usize> Entity for Numbered<N> {
        fn table_name_override() -> Option<&'static str> {
            Some(TABLES[N])
        }

        fn fields() -> Vec<FieldMeta> {
            vec![FieldMeta::named("id")]
        }

        fn field_value(&self, _field: &str) -> Option<DatabaseValue> {
            None
        }

        fn set_field(&mut self, _field: &str, _value: DatabaseValue) -> OrmResult<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default)]
    struct SameTable;

    impl Entity for SameTable {
        fn table_name_override() -> Option<&'static str> {
            Some("t00")
        }

        fn fields() -> Vec<FieldMeta> {
            vec![FieldMeta::named("id")]
        }

        fn field_value(&self, _field: &str) -> Option<DatabaseValue> {
            None
        }

        fn set_field(&mut self, _field: &str, _value: DatabaseValue) -> OrmResult<()> {
            Ok(())
        }
    }

    macro_rules! add_numbered {
        ($table:expr; $($n:literal)+) => {
            $( $table.add::<Numbered<$n>>().unwrap(); )+
        };
    }

    #[test]
    fn test_aliases_follow_join_order() {
        let mut table = AliasTable::new();
        assert_eq!(table.add::<Numbered<5>>().unwrap(), "a");
        assert_eq!(table.add::<Numbered<2>>().unwrap(), "b");
        assert_eq!(table.table_for_alias("a"), Some("t05"));
        assert_eq!(table.alias_for_table("t02"), Some("b"));
        assert_eq!(table.table_of::<Numbered<5>>(), Some("t05"));
        assert!(table.is_aliased::<Numbered<2>>());
        assert!(!table.is_aliased::<Numbered<3>>());
        assert!(table.alias_of::<Numbered<3>>().is_err());
    }

    #[test]
    fn test_rejoining_a_table_reuses_its_alias() {
        let mut table = AliasTable::new();
        table.add::<Numbered<0>>().unwrap();
        assert_eq!(table.add::<Numbered<0>>().unwrap(), "a");
        assert_eq!(table.len(), 1);
        assert_eq!(table.entities().len(), 1);
    }

    #[test]
    fn test_second_type_on_a_joined_table_is_rejected() {
        let mut table = AliasTable::new();
        table.add::<Numbered<0>>().unwrap();

        let err = table.add::<SameTable>().unwrap_err();
        assert!(matches!(err, OrmError::Metadata(msg) if msg.contains("'t00'")));
        assert!(!table.is_aliased::<SameTable>());
        assert_eq!(table.alias_of::<Numbered<0>>().unwrap(), "a");
    }

    #[test]
    fn test_capacity_is_52_tables() {
        let mut table = AliasTable::new();
        add_numbered!(table;
            0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25
            26 27 28 29 30 31 32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51);

        assert_eq!(table.len(), MAX_ALIASES);
        assert_eq!(table.alias_for_table("t25"), Some("z"));
        assert_eq!(table.alias_for_table("t26"), Some("A"));
        assert_eq!(table.alias_for_table("t51"), Some("Z"));

        let err = table.add::<Numbered<52>>().unwrap_err();
        assert!(matches!(err, OrmError::AliasCapacity { limit: 52, .. }));
        // known tables still resolve after the limit is hit
        assert_eq!(table.add::<Numbered<7>>().unwrap(), "h");
    }

    #[test]
    fn test_aliases_iterate_in_byte_order() {
        let mut table = AliasTable::new();
        add_numbered!(table;
            0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26);
        let first = table.aliases().next().unwrap();
        assert_eq!(first, ("A", "t26"));
        assert_eq!(table.entities()[0].table(), "t00");
    }
}
