//! Database Backend Abstractions
//!
//! Backend traits the query engine executes against, plus the sqlx-backed
//! PostgreSQL and MySQL implementations.

pub mod core;
pub mod mysql;
pub mod postgres;

// Re-export core traits and types
pub use core::*;
pub use mysql::MySqlBackend;
pub use postgres::PostgresBackend;

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    MySQL,
}

impl DatabaseBackendType {
    pub fn dialect(&self) -> SqlDialect {
        match self {
            DatabaseBackendType::PostgreSQL => SqlDialect::PostgreSQL,
            DatabaseBackendType::MySQL => SqlDialect::MySQL,
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::MySQL => write!(f, "mysql"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "mysql" => Ok(DatabaseBackendType::MySQL),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}
