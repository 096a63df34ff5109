//! Core Database Backend Traits
//!
//! The query engine never talks to a driver directly. It works against these
//! traits: a pool that can begin transactions and report its dialect, a
//! transaction that runs positional-parameter statements, and rows that expose
//! their columns by name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{OrmError, OrmResult};

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a statement within the transaction and return affected rows
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute a query and return result rows within the transaction
    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row within the transaction
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Option<Box<dyn DatabaseRow>>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> OrmResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}

/// Abstract database connection pool trait
///
/// Implementations must be safe to share across tasks; every query execution
/// acquires its own transaction.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Begin a transaction from the pool
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>>;

    /// SQL dialect spoken by this pool
    fn dialect(&self) -> SqlDialect;

    /// Close the pool
    async fn close(&self) -> OrmResult<()>;
}

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by index
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue>;

    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        let index = self
            .column_names()
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| OrmError::Materialization(format!("Column '{}' not found", name)))?;
        self.get_by_index(index)
    }

    /// Get column count
    fn column_count(&self) -> usize;

    /// Get column names in result order
    fn column_names(&self) -> Vec<String>;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(JsonValue),
    Array(Vec<DatabaseValue>),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Render the value as an inline SQL literal, for debug output only
    pub fn to_sql_literal(&self) -> String {
        match self {
            DatabaseValue::Null => "NULL".to_string(),
            DatabaseValue::Bool(b) => b.to_string(),
            DatabaseValue::Int32(i) => i.to_string(),
            DatabaseValue::Int64(i) => i.to_string(),
            DatabaseValue::Float32(f) => f.to_string(),
            DatabaseValue::Float64(f) => f.to_string(),
            DatabaseValue::String(s) => quote(s),
            DatabaseValue::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                format!("X'{}'", hex)
            }
            DatabaseValue::Uuid(u) => quote(&u.to_string()),
            DatabaseValue::DateTime(dt) => quote(&dt.to_rfc3339()),
            DatabaseValue::Date(d) => quote(&d.to_string()),
            DatabaseValue::Time(t) => quote(&t.to_string()),
            DatabaseValue::Json(j) => quote(&j.to_string()),
            DatabaseValue::Array(values) => values
                .iter()
                .map(DatabaseValue::to_sql_literal)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::from(*i),
            DatabaseValue::Int64(i) => JsonValue::from(*i),
            DatabaseValue::Float32(f) => serde_json::Number::from_f64(f64::from(*f))
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
            DatabaseValue::Array(arr) => JsonValue::Array(arr.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Human-readable variant name, used in conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int32(_) => "int32",
            DatabaseValue::Int64(_) => "int64",
            DatabaseValue::Float32(_) => "float32",
            DatabaseValue::Float64(_) => "float64",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
            DatabaseValue::Uuid(_) => "uuid",
            DatabaseValue::DateTime(_) => "datetime",
            DatabaseValue::Date(_) => "date",
            DatabaseValue::Time(_) => "time",
            DatabaseValue::Json(_) => "json",
            DatabaseValue::Array(_) => "array",
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f32> for DatabaseValue {
    fn from(value: f32) -> Self {
        DatabaseValue::Float32(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<Uuid> for DatabaseValue {
    fn from(value: Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<NaiveDate> for DatabaseValue {
    fn from(value: NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<NaiveTime> for DatabaseValue {
    fn from(value: NaiveTime) -> Self {
        DatabaseValue::Time(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl From<HashMap<String, JsonValue>> for DatabaseValue {
    fn from(value: HashMap<String, JsonValue>) -> Self {
        DatabaseValue::Json(JsonValue::Object(value.into_iter().collect()))
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// Conversion from a column value into a typed entity field
///
/// `Option<T>` maps NULL to `None` and allocates `Some` for anything else, so
/// nullable columns scan into optional fields without special casing.
pub trait FromDatabaseValue: Sized {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self>;
}

fn mismatch<T>(expected: &str, value: &DatabaseValue) -> OrmResult<T> {
    Err(OrmError::Materialization(format!(
        "Cannot convert {} value into {}",
        value.type_name(),
        expected
    )))
}

impl FromDatabaseValue for DatabaseValue {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        Ok(value)
    }
}

impl FromDatabaseValue for bool {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Bool(b) => Ok(b),
            // MySQL reports booleans as TINYINT
            DatabaseValue::Int32(i) => Ok(i != 0),
            DatabaseValue::Int64(i) => Ok(i != 0),
            other => mismatch("bool", &other),
        }
    }
}

impl FromDatabaseValue for i32 {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Int32(i) => Ok(i),
            DatabaseValue::Int64(i) => i32::try_from(i).map_err(|_| {
                OrmError::Materialization(format!("Value {} does not fit into i32", i))
            }),
            other => mismatch("i32", &other),
        }
    }
}

impl FromDatabaseValue for i64 {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Int32(i) => Ok(i64::from(i)),
            DatabaseValue::Int64(i) => Ok(i),
            other => mismatch("i64", &other),
        }
    }
}

impl FromDatabaseValue for f64 {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Float32(f) => Ok(f64::from(f)),
            DatabaseValue::Float64(f) => Ok(f),
            DatabaseValue::Int32(i) => Ok(f64::from(i)),
            other => mismatch("f64", &other),
        }
    }
}

impl FromDatabaseValue for f32 {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Float32(f) => Ok(f),
            other => mismatch("f32", &other),
        }
    }
}

impl FromDatabaseValue for String {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::String(s) => Ok(s),
            DatabaseValue::Uuid(u) => Ok(u.to_string()),
            other => mismatch("String", &other),
        }
    }
}

impl FromDatabaseValue for Vec<u8> {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Bytes(b) => Ok(b),
            DatabaseValue::String(s) => Ok(s.into_bytes()),
            other => mismatch("bytes", &other),
        }
    }
}

impl FromDatabaseValue for Uuid {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Uuid(u) => Ok(u),
            DatabaseValue::String(s) => Uuid::parse_str(&s)
                .map_err(|e| OrmError::Materialization(format!("Invalid UUID '{}': {}", s, e))),
            other => mismatch("Uuid", &other),
        }
    }
}

impl FromDatabaseValue for DateTime<Utc> {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::DateTime(dt) => Ok(dt),
            DatabaseValue::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| OrmError::Materialization(format!("Invalid timestamp '{}': {}", s, e))),
            other => mismatch("DateTime<Utc>", &other),
        }
    }
}

impl FromDatabaseValue for NaiveDate {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Date(d) => Ok(d),
            other => mismatch("NaiveDate", &other),
        }
    }
}

impl FromDatabaseValue for NaiveTime {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Time(t) => Ok(t),
            other => mismatch("NaiveTime", &other),
        }
    }
}

impl FromDatabaseValue for JsonValue {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match value {
            DatabaseValue::Json(j) => Ok(j),
            DatabaseValue::String(s) => Ok(serde_json::from_str(&s)?),
            other => Ok(other.to_json()),
        }
    }
}

impl FromDatabaseValue for HashMap<String, JsonValue> {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        match JsonValue::from_database_value(value)? {
            JsonValue::Object(map) => Ok(map.into_iter().collect()),
            JsonValue::Null => Ok(HashMap::new()),
            other => Err(OrmError::Materialization(format!(
                "Expected a JSON object, got {}",
                other
            ))),
        }
    }
}

impl<T: FromDatabaseValue> FromDatabaseValue for Option<T> {
    fn from_database_value(value: DatabaseValue) -> OrmResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_database_value(value).map(Some)
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// No dialect configured; rebinding falls back to `?` placeholders
    #[default]
    Unset,
    PostgreSQL,
    MySQL,
}

impl SqlDialect {
    /// Get the parameter placeholder for the zero-based parameter index
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::Unset => "?".to_string(),
        }
    }

    /// Whether INSERT ... RETURNING is available
    pub fn supports_returning(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL)
    }
}

/// Database backend trait that provides database-specific implementations
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Create a connection pool from a database URL
    async fn create_pool(
        &self,
        database_url: &str,
        config: DatabasePoolConfig,
    ) -> OrmResult<Arc<dyn DatabasePool>>;

    /// Get the SQL dialect used by this backend
    fn sql_dialect(&self) -> SqlDialect;

    /// Get the backend type
    fn backend_type(&self) -> crate::backends::DatabaseBackendType;

    /// Validate a database URL for this backend
    fn validate_database_url(&self, url: &str) -> OrmResult<()>;
}

/// Database pool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),  // 10 minutes
            max_lifetime_seconds: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl DatabasePoolConfig {
    /// Build a config from `JOINERY_DB_*` environment variables, keeping
    /// defaults for anything unset
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> OrmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>) -> OrmResult<Option<T>> {
            raw.map(|value| {
                value.trim().parse::<T>().map_err(|_| {
                    OrmError::Configuration(format!("Invalid value '{}' for {}", value, key))
                })
            })
            .transpose()
        }

        let mut config = Self::default();
        if let Some(v) = parse("JOINERY_DB_MAX_CONNECTIONS", lookup("JOINERY_DB_MAX_CONNECTIONS"))? {
            config.max_connections = v;
        }
        if let Some(v) = parse("JOINERY_DB_MIN_CONNECTIONS", lookup("JOINERY_DB_MIN_CONNECTIONS"))? {
            config.min_connections = v;
        }
        if let Some(v) = parse("JOINERY_DB_ACQUIRE_TIMEOUT", lookup("JOINERY_DB_ACQUIRE_TIMEOUT"))? {
            config.acquire_timeout_seconds = v;
        }
        if let Some(v) = parse("JOINERY_DB_IDLE_TIMEOUT", lookup("JOINERY_DB_IDLE_TIMEOUT"))? {
            config.idle_timeout_seconds = Some(v);
        }
        if let Some(v) = parse("JOINERY_DB_MAX_LIFETIME", lookup("JOINERY_DB_MAX_LIFETIME"))? {
            config.max_lifetime_seconds = Some(v);
        }
        if let Some(v) = parse("JOINERY_DB_TEST_BEFORE_ACQUIRE", lookup("JOINERY_DB_TEST_BEFORE_ACQUIRE"))? {
            config.test_before_acquire = v;
        }

        if config.min_connections > config.max_connections {
            return Err(OrmError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                config.min_connections, config.max_connections
            )));
        }
        Ok(config)
    }
}

/// Database backend registry for managing multiple backend implementations
pub struct DatabaseBackendRegistry {
    backends: HashMap<crate::backends::DatabaseBackendType, Arc<dyn DatabaseBackend>>,
}

impl DatabaseBackendRegistry {
    /// Create a new backend registry
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Registry with the bundled PostgreSQL and MySQL backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            crate::backends::DatabaseBackendType::PostgreSQL,
            Arc::new(crate::backends::PostgresBackend::new()),
        );
        registry.register(
            crate::backends::DatabaseBackendType::MySQL,
            Arc::new(crate::backends::MySqlBackend::new()),
        );
        registry
    }

    /// Register a database backend
    pub fn register(
        &mut self,
        backend_type: crate::backends::DatabaseBackendType,
        backend: Arc<dyn DatabaseBackend>,
    ) {
        self.backends.insert(backend_type, backend);
    }

    /// Get a database backend by type
    pub fn get(
        &self,
        backend_type: &crate::backends::DatabaseBackendType,
    ) -> Option<Arc<dyn DatabaseBackend>> {
        self.backends.get(backend_type).cloned()
    }

    /// Create a connection pool using the appropriate backend for the given URL
    pub async fn create_pool(
        &self,
        database_url: &str,
        config: DatabasePoolConfig,
    ) -> OrmResult<Arc<dyn DatabasePool>> {
        let backend_type = Self::detect_backend_from_url(database_url)?;
        let backend = self.get(&backend_type).ok_or_else(|| {
            OrmError::Connection(format!("No backend registered for {}", backend_type))
        })?;

        backend.validate_database_url(database_url)?;
        backend.create_pool(database_url, config).await
    }

    /// Detect database backend type from URL
    pub fn detect_backend_from_url(url: &str) -> OrmResult<crate::backends::DatabaseBackendType> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(crate::backends::DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("mysql://") {
            Ok(crate::backends::DatabaseBackendType::MySQL)
        } else {
            Err(OrmError::Connection(format!(
                "Unable to detect database backend from URL: {}",
                url
            )))
        }
    }
}

impl Default for DatabaseBackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
