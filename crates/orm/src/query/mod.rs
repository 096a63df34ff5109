//! Query Builder Module - multi-entity SELECT construction with automatic joins
//!
//! - `alias`: per-query table aliases
//! - `condition`: the `Queryable` expression tree
//! - `builder` and its operation files: fluent accumulation of joins, select
//!   lists, conditions and options
//! - `sql_generation`: clause rendering and caching
//! - `execution`: running the statement through an `OrmContext`

pub mod alias;
pub mod builder;
pub mod condition;
pub mod execution;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use alias::{AliasTable, ALIAS_ALPHABET, MAX_ALIASES};
pub use builder::QueryBuilder;
pub use condition::{ComparisonOp, Combinator, Queryable};
pub use types::{OrderDirection, OrderTerm, Rendered};
