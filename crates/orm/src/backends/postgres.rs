//! PostgreSQL Backend Implementation
//!
//! PostgreSQL implementation of the backend traits using sqlx as the
//! underlying driver.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;

use super::core::*;
use crate::error::{DatabaseError, OrmError, OrmResult};

/// PostgreSQL database backend implementation
#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    /// Create a new PostgreSQL backend instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn create_pool(
        &self,
        database_url: &str,
        config: DatabasePoolConfig,
    ) -> OrmResult<Arc<dyn DatabasePool>> {
        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout_seconds {
            options = options.idle_timeout(std::time::Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime_seconds {
            options = options.max_lifetime(std::time::Duration::from_secs(max_lifetime));
        }

        let sqlx_pool = options
            .connect(database_url)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        debug!(max_connections = config.max_connections, "PostgreSQL pool created");
        Ok(Arc::new(PostgresPool::new(Arc::new(sqlx_pool))))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn backend_type(&self) -> crate::backends::DatabaseBackendType {
        crate::backends::DatabaseBackendType::PostgreSQL
    }

    fn validate_database_url(&self, url: &str) -> OrmResult<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| OrmError::Connection(format!("Invalid database URL: {}", e)))?;
        if parsed.scheme() != "postgresql" && parsed.scheme() != "postgres" {
            return Err(OrmError::Connection("Invalid PostgreSQL URL scheme".to_string()));
        }
        if parsed.path().trim_start_matches('/').is_empty() {
            return Err(OrmError::Connection("Missing database name in URL".to_string()));
        }
        Ok(())
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresPool {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await.map_err(translate)?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let tx = self.active()?;
        let query = bind_all(sqlx::query(sql), params)?;
        let result = query.execute(&mut **tx).await.map_err(translate)?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        let tx = self.active()?;
        let query = bind_all(sqlx::query(sql), params)?;
        let rows = query.fetch_all(&mut **tx).await.map_err(translate)?;
        Ok(rows
            .into_iter()
            .map(|row| Box::new(PostgresRow { row }) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        let tx = self.active()?;
        let query = bind_all(sqlx::query(sql), params)?;
        let row = query.fetch_optional(&mut **tx).await.map_err(translate)?;
        Ok(row.map(|row| Box::new(PostgresRow { row }) as Box<dyn DatabaseRow>))
    }

    async fn commit(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;
        tx.commit()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;
        tx.rollback()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl DatabaseRow for PostgresRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        postgres_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

fn translate(err: sqlx::Error) -> OrmError {
    match err {
        sqlx::Error::RowNotFound => OrmError::Database(DatabaseError::no_rows(err.to_string())),
        other => OrmError::Database(DatabaseError::translate(SqlDialect::PostgreSQL, other.to_string())),
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

fn bind_all<'q>(mut query: PgQuery<'q>, params: &[DatabaseValue]) -> OrmResult<PgQuery<'q>> {
    for param in params {
        query = bind_database_value(query, param)?;
    }
    Ok(query)
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(query: PgQuery<'q>, value: &DatabaseValue) -> OrmResult<PgQuery<'q>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(*u)),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Date(d) => Ok(query.bind(*d)),
        DatabaseValue::Time(t) => Ok(query.bind(*t)),
        DatabaseValue::Json(j) => Ok(query.bind(j.clone())),
        DatabaseValue::Array(_) => Err(OrmError::Query(
            "Array values must be expanded into an IN list before binding".to_string(),
        )),
    }
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let column = row
        .columns()
        .get(index)
        .ok_or_else(|| OrmError::Materialization(format!("Column index {} out of range", index)))?;
    let type_name = column.type_info().name().to_string();

    let raw = row.try_get_raw(index).map_err(translate)?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let value = match type_name.as_str() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index).map_err(translate)?),
        "INT2" => DatabaseValue::Int32(i32::from(row.try_get::<i16, _>(index).map_err(translate)?)),
        "INT4" => DatabaseValue::Int32(row.try_get(index).map_err(translate)?),
        "INT8" => DatabaseValue::Int64(row.try_get(index).map_err(translate)?),
        "FLOAT4" => DatabaseValue::Float32(row.try_get(index).map_err(translate)?),
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index).map_err(translate)?),
        "BYTEA" => DatabaseValue::Bytes(row.try_get(index).map_err(translate)?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index).map_err(translate)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index).map_err(translate)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index).map_err(translate)?;
            DatabaseValue::DateTime(naive.and_utc())
        }
        "DATE" => DatabaseValue::Date(row.try_get(index).map_err(translate)?),
        "TIME" => DatabaseValue::Time(row.try_get(index).map_err(translate)?),
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index).map_err(translate)?),
        _ => DatabaseValue::String(row.try_get(index).map_err(|e| {
            OrmError::Materialization(format!(
                "Failed to read column of unsupported type '{}': {}",
                type_name, e
            ))
        })?),
    };
    Ok(value)
}
