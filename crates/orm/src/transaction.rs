//! Transaction Management
//!
//! Wraps a backend transaction so statements can be issued with named
//! placeholders, and provides scoped execution with automatic commit or
//! rollback. A panic inside the scope is caught, the transaction rolled back
//! and the panic reported as an error.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::backends::{DatabasePool, DatabaseRow, DatabaseTransaction, SqlDialect};
use crate::error::{OrmError, OrmResult};
use crate::sql::{rebind, NamedArg};

/// Transaction handle issuing named-placeholder statements
pub struct Transaction {
    inner: Option<Box<dyn DatabaseTransaction>>,
    dialect: SqlDialect,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("dialect", &self.dialect)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Transaction {
    /// Begin a transaction on the pool
    pub async fn begin(pool: &dyn DatabasePool) -> OrmResult<Self> {
        let inner = pool.begin_transaction().await?;
        debug!(dialect = ?pool.dialect(), "transaction started");
        Ok(Self {
            inner: Some(inner),
            dialect: pool.dialect(),
        })
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Check if the transaction is still active (not committed or rolled back)
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    fn inner_mut(&mut self) -> OrmResult<&mut Box<dyn DatabaseTransaction>> {
        self.inner
            .as_mut()
            .ok_or_else(|| OrmError::Transaction("Transaction has already been consumed".to_string()))
    }

    fn prepare(&self, sql: &str, args: &[NamedArg]) -> OrmResult<(String, Vec<crate::backends::DatabaseValue>)> {
        let (statement, values) = rebind(sql, args, self.dialect)?;
        debug!(sql = %statement, binds = values.len(), "executing statement");
        Ok((statement, values))
    }

    /// Run a statement and return the number of affected rows
    pub async fn execute(&mut self, sql: &str, args: &[NamedArg]) -> OrmResult<u64> {
        let (statement, values) = self.prepare(sql, args)?;
        self.inner_mut()?.execute(&statement, &values).await
    }

    /// Run a query and return all rows
    pub async fn fetch_all(&mut self, sql: &str, args: &[NamedArg]) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        let (statement, values) = self.prepare(sql, args)?;
        self.inner_mut()?.fetch_all(&statement, &values).await
    }

    /// Run a query and return the first row, if any
    pub async fn fetch_optional(
        &mut self,
        sql: &str,
        args: &[NamedArg],
    ) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        let (statement, values) = self.prepare(sql, args)?;
        self.inner_mut()?.fetch_optional(&statement, &values).await
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> OrmResult<()> {
        match self.inner.take() {
            Some(tx) => {
                tx.commit().await?;
                debug!("transaction committed");
                Ok(())
            }
            None => Err(OrmError::Transaction("Transaction has already been consumed".to_string())),
        }
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> OrmResult<()> {
        match self.inner.take() {
            Some(tx) => {
                tx.rollback().await?;
                debug!("transaction rolled back");
                Ok(())
            }
            None => Err(OrmError::Transaction("Transaction has already been consumed".to_string())),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            // the driver rolls back when its transaction is dropped
            warn!("Transaction dropped without explicit commit or rollback");
        }
    }
}

/// Run `f` in a transaction: commit on `Ok`, roll back on `Err` or panic
pub async fn with_transaction<T, F>(pool: &dyn DatabasePool, f: F) -> OrmResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, OrmResult<T>> + Send,
{
    let mut tx = Transaction::begin(pool).await?;

    let outcome = AssertUnwindSafe(async { f(&mut tx).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(OrmError::Transaction(panic_message(payload))));

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "rolling back transaction");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panic inside transaction: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed), "panic inside transaction: boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("bad row"));
        assert_eq!(panic_message(owned), "panic inside transaction: bad row");

        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other), "panic inside transaction: unknown panic");
    }
}
