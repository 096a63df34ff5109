//! Entities used across the integration tests

use joinery_orm::{entity_accessors, DatabaseValue, Entity, FieldMeta, IdGeneration, Relationship};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Author {
    pub id: Option<i64>,
    pub name: String,
}

impl Entity for Author {
    fn fields() -> Vec<FieldMeta> {
        vec![FieldMeta::named("id").primary_key(), FieldMeta::named("name")]
    }

    fn relationships() -> Option<Vec<Relationship>> {
        Some(Vec::new())
    }

    fn id_generation() -> IdGeneration {
        IdGeneration::Database
    }

    entity_accessors!(id, name);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub id: Option<i64>,
    pub author_id: i64,
    pub title: String,
}

impl Entity for Book {
    fn fields() -> Vec<FieldMeta> {
        vec![
            FieldMeta::named("id").primary_key(),
            FieldMeta::named("author_id"),
            FieldMeta::named("title"),
        ]
    }

    fn relationships() -> Option<Vec<Relationship>> {
        Some(vec![Relationship::between::<Book, Author>("author_id", "id")])
    }

    fn id_generation() -> IdGeneration {
        IdGeneration::Database
    }

    entity_accessors!(id, author_id, title);
}

/// Keyed by an application-generated id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: Option<String>,
    pub label: String,
}

impl Entity for Tag {
    fn fields() -> Vec<FieldMeta> {
        vec![FieldMeta::named("id").primary_key(), FieldMeta::named("label")]
    }

    fn id_generation() -> IdGeneration {
        IdGeneration::Application
    }

    fn generate_id(&self) -> Option<DatabaseValue> {
        Some(DatabaseValue::from(format!("tag-{}", self.label)))
    }

    entity_accessors!(id, label);
}

/// Has a writable column whose name looks like a key placeholder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lock {
    pub id: Option<i64>,
    pub key_id: i64,
}

impl Entity for Lock {
    fn fields() -> Vec<FieldMeta> {
        vec![FieldMeta::named("id").primary_key(), FieldMeta::named("key_id")]
    }

    entity_accessors!(id, key_id);
}
