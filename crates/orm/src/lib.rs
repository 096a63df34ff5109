//! # joinery-orm: query construction and join resolution
//!
//! Entities describe their table, columns and relationships through the
//! [`Entity`] trait. A [`QueryBuilder`] joins entities (planning the JOIN
//! chain from declared relationships), accumulates conditions built from
//! [`Queryable`] nodes, renders alias-aware parameterized SQL and materializes
//! `alias_column` result rows back into typed entities.
//!
//! ```ignore
//! let ctx = OrmContext::connect("postgres://localhost/app", DatabasePoolConfig::default()).await?;
//!
//! let (posts, users): (Vec<Post>, Vec<User>) = QueryBuilder::new()
//!     .join::<Post>()
//!     .join::<User>()
//!     .where_eq(column::<User>("name"), "ann")
//!     .order_by_desc(column::<Post>("created_at"))
//!     .fetch(&ctx)
//!     .await?;
//! ```

pub mod backends;
pub mod database;
pub mod error;
pub mod hydration;
pub mod model;
pub mod query;
pub mod relationships;
pub mod sql;
pub mod transaction;


// Re-export core traits and types
pub use backends::{
    DatabaseBackendRegistry, DatabaseBackendType, DatabasePool, DatabasePoolConfig, DatabaseRow,
    DatabaseTransaction, DatabaseValue, FromDatabaseValue, SqlDialect,
};
pub use database::OrmContext;
pub use error::*;
pub use hydration::{parse_column_alias, Destination, MaterializedRow, Results};
pub use model::{
    descriptor_of, table_name_of, CrudOperations, Entity, EntityDescriptor, FieldMeta,
    IdGeneration, SavedObjectTracker,
};
pub use query::condition::{
    all_columns, and, col, column, comma, eq, ge, gt, in_expr, in_list, le, lt, ne, not, or,
    table_column, value,
};
pub use query::{AliasTable, OrderDirection, QueryBuilder, Queryable};
pub use relationships::{find_relationship_between, plan_joins, Relationship};
pub use sql::{rebind, NamedArg};
pub use transaction::{with_transaction, Transaction};
