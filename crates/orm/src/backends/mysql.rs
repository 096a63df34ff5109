//! MySQL Backend Implementation
//!
//! MySQL implementation of the backend traits using sqlx. MySQL has no
//! `RETURNING`; database-generated keys are read back with `LAST_INSERT_ID()`
//! on the same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySql, Pool, Row, TypeInfo, ValueRef};
use tracing::debug;

use super::core::*;
use crate::error::{DatabaseError, OrmError, OrmResult};

/// MySQL database backend implementation
#[derive(Debug, Default)]
pub struct MySqlBackend;

impl MySqlBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for MySqlBackend {
    async fn create_pool(
        &self,
        database_url: &str,
        config: DatabasePoolConfig,
    ) -> OrmResult<Arc<dyn DatabasePool>> {
        let mut options = MySqlPoolOptions::new()
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
            .map_err(|e| OrmError::Connection(format!("Failed to create MySQL pool: {}", e)))?;

        debug!(max_connections = config.max_connections, "MySQL pool created");
        Ok(Arc::new(MySqlDatabasePool {
            pool: Arc::new(sqlx_pool),
        }))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::MySQL
    }

    fn backend_type(&self) -> crate::backends::DatabaseBackendType {
        crate::backends::DatabaseBackendType::MySQL
    }

    fn validate_database_url(&self, url: &str) -> OrmResult<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| OrmError::Connection(format!("Invalid database URL: {}", e)))?;
        if parsed.scheme() != "mysql" {
            return Err(OrmError::Connection("Invalid MySQL URL scheme".to_string()));
        }
        Ok(())
    }
}

/// MySQL connection pool implementation
pub struct MySqlDatabasePool {
    pool: Arc<Pool<MySql>>,
}

impl MySqlDatabasePool {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for MySqlDatabasePool {
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await.map_err(translate)?;
        Ok(Box::new(MySqlTransaction { tx: Some(tx) }))
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySQL
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// MySQL transaction implementation
pub struct MySqlTransaction {
    tx: Option<sqlx::Transaction<'static, MySql>>,
}

impl MySqlTransaction {
    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'static, MySql>> {
        self.tx
            .as_mut()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for MySqlTransaction {
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
            .map(|row| Box::new(MySqlDatabaseRow { row }) as Box<dyn DatabaseRow>)
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
        Ok(row.map(|row| Box::new(MySqlDatabaseRow { row }) as Box<dyn DatabaseRow>))
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

/// MySQL row implementation
pub struct MySqlDatabaseRow {
    row: MySqlRow,
}

impl DatabaseRow for MySqlDatabaseRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        mysql_value_to_database_value(&self.row, index)
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
        other => OrmError::Database(DatabaseError::translate(SqlDialect::MySQL, other.to_string())),
    }
}

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

fn bind_all<'q>(mut query: MySqlQuery<'q>, params: &[DatabaseValue]) -> OrmResult<MySqlQuery<'q>> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(Option::<String>::None),
            DatabaseValue::Bool(b) => query.bind(*b),
            DatabaseValue::Int32(i) => query.bind(*i),
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::Float32(f) => query.bind(*f),
            DatabaseValue::Float64(f) => query.bind(*f),
            DatabaseValue::String(s) => query.bind(s.clone()),
            DatabaseValue::Bytes(b) => query.bind(b.clone()),
            DatabaseValue::Uuid(u) => query.bind(u.to_string()),
            DatabaseValue::DateTime(dt) => query.bind(*dt),
            DatabaseValue::Date(d) => query.bind(*d),
            DatabaseValue::Time(t) => query.bind(*t),
            DatabaseValue::Json(j) => query.bind(j.clone()),
            DatabaseValue::Array(_) => {
                return Err(OrmError::Query(
                    "Array values must be expanded into an IN list before binding".to_string(),
                ))
            }
        };
    }
    Ok(query)
}

fn mysql_value_to_database_value(row: &MySqlRow, index: usize) -> OrmResult<DatabaseValue> {
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
        "BOOLEAN" => DatabaseValue::Bool(row.try_get(index).map_err(translate)?),
        "TINYINT" | "SMALLINT" | "INT" | "MEDIUMINT" => {
            DatabaseValue::Int32(row.try_get(index).map_err(translate)?)
        }
        "BIGINT" => DatabaseValue::Int64(row.try_get(index).map_err(translate)?),
        "BIGINT UNSIGNED" | "INT UNSIGNED" => {
            let value: u64 = row.try_get(index).map_err(translate)?;
            DatabaseValue::Int64(i64::try_from(value).map_err(|_| {
                OrmError::Materialization(format!("Unsigned value {} does not fit into i64", value))
            })?)
        }
        "FLOAT" => DatabaseValue::Float32(row.try_get(index).map_err(translate)?),
        "DOUBLE" => DatabaseValue::Float64(row.try_get(index).map_err(translate)?),
        "BLOB" | "VARBINARY" | "BINARY" => DatabaseValue::Bytes(row.try_get(index).map_err(translate)?),
        "TIMESTAMP" => DatabaseValue::DateTime(row.try_get(index).map_err(translate)?),
        "DATETIME" => {
            let naive: chrono::NaiveDateTime = row.try_get(index).map_err(translate)?;
            DatabaseValue::DateTime(naive.and_utc())
        }
        "DATE" => DatabaseValue::Date(row.try_get(index).map_err(translate)?),
        "TIME" => DatabaseValue::Time(row.try_get(index).map_err(translate)?),
        "JSON" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index).map_err(translate)?),
        _ => DatabaseValue::String(row.try_get(index).map_err(|e| {
            OrmError::Materialization(format!(
                "Failed to read column of unsupported type '{}': {}",
                type_name, e
            ))
        })?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_database_url() {
        let backend = MySqlBackend::new();
        assert!(backend.validate_database_url("mysql://root@localhost/app").is_ok());
        assert!(backend.validate_database_url("postgres://localhost/app").is_err());
        assert_eq!(backend.sql_dialect(), SqlDialect::MySQL);
    }
}
