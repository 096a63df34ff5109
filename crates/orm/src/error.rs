//! Error types for the ORM system
//!
//! Provides error handling for entity metadata, join planning, alias
//! assignment, result materialization and translated database failures.

use std::fmt;

use crate::backends::SqlDialect;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Entity has no resolvable table name, key or field
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// No declared or invertible relationship connects two joined entities
    #[error(transparent)]
    Relationship(#[from] RelationshipError),

    /// More distinct tables were joined than the alias alphabet supports
    #[error("Alias capacity exceeded: cannot alias table '{table}', at most {limit} tables may be joined")]
    AliasCapacity { limit: usize, table: String },

    /// A result column could not be mapped onto a joined entity field
    #[error("Materialization error: {0}")]
    Materialization(String),

    /// Translated driver error
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Query building or rendering error
    #[error("Query error: {0}")]
    Query(String),

    /// Errors collected by a query builder before it was asked to render
    #[error("Query builder collected {} error(s): {}", .0.len(), join_messages(.0))]
    Builder(Vec<ModelError>),

    /// Primary key is missing or invalid
    #[error("Primary key is missing or invalid")]
    MissingPrimaryKey,

    /// Connection pool error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn join_messages(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ModelError {
    /// Kind of the underlying database error, if this is one
    pub fn database_kind(&self) -> Option<DatabaseErrorKind> {
        match self {
            ModelError::Database(err) => Some(err.kind),
            _ => None,
        }
    }

    /// True when the error reports a missing row
    pub fn is_no_rows(&self) -> bool {
        self.database_kind() == Some(DatabaseErrorKind::NoRows)
    }

    /// True when the error reports a unique-constraint violation
    pub fn is_duplicate_entry(&self) -> bool {
        self.database_kind() == Some(DatabaseErrorKind::DuplicateEntry)
    }
}

/// Error types for relationship resolution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelationshipError {
    /// Neither entity declares any relationships at all
    #[error("Neither '{from}' nor '{to}' declares relationships")]
    NotRelationshipCapable { from: String, to: String },

    /// Relationships are declared but none connects the two tables
    #[error("No relationship connects '{from}' and '{to}'")]
    NoRelationship { from: String, to: String },
}

/// Closed set of database failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    /// Unique or primary key constraint violated
    DuplicateEntry,
    /// A query expected a row and got none
    NoRows,
    /// Anything else
    Other,
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseErrorKind::DuplicateEntry => write!(f, "duplicate entry"),
            DatabaseErrorKind::NoRows => write!(f, "no rows found"),
            DatabaseErrorKind::Other => write!(f, "database error"),
        }
    }
}

/// Driver error translated into a [`DatabaseErrorKind`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Database error ({kind}): {message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_rows(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NoRows, message)
    }

    /// Classify raw driver error text for the given dialect
    pub fn translate(dialect: SqlDialect, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();

        let duplicate = match dialect {
            SqlDialect::PostgreSQL => {
                lowered.contains("duplicate key value violates unique constraint")
                    || lowered.contains("sqlstate 23505")
            }
            SqlDialect::MySQL => {
                lowered.contains("duplicate entry") || lowered.contains("error 1062")
            }
            SqlDialect::Unset => {
                lowered.contains("duplicate key") || lowered.contains("duplicate entry")
            }
        };

        let kind = if duplicate {
            DatabaseErrorKind::DuplicateEntry
        } else if lowered.contains("no rows returned")
            || lowered.contains("no rows in result set")
            || lowered.contains("rownotfound")
        {
            DatabaseErrorKind::NoRows
        } else {
            DatabaseErrorKind::Other
        };

        Self { kind, message }
    }
}

// sqlx errors carry no dialect on their own; dialect-aware translation happens
// in the backends, this covers the generic path.
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                ModelError::Database(DatabaseError::no_rows(err.to_string()))
            }
            other => ModelError::Database(DatabaseError::translate(
                SqlDialect::Unset,
                other.to_string(),
            )),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Materialization(err.to_string())
    }
}
