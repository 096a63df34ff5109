//! Database Context - pool handle and saved-object tracker passed to every call
//!
//! Replaces process-wide pool and "is this object saved" state with one
//! explicit value. Clones share the pool and the tracker.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use crate::backends::{DatabaseBackendRegistry, DatabasePool, DatabasePoolConfig, SqlDialect};
use crate::error::{OrmError, OrmResult};
use crate::model::SavedObjectTracker;
use crate::transaction::{with_transaction, Transaction};

/// Environment variable holding the connection URL for [`OrmContext::from_env`]
pub const DATABASE_URL_ENV: &str = "JOINERY_DATABASE_URL";

/// Execution context for queries and persistence calls
#[derive(Clone)]
pub struct OrmContext {
    pool: Arc<dyn DatabasePool>,
    tracker: SavedObjectTracker,
}

impl std::fmt::Debug for OrmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrmContext")
            .field("dialect", &self.pool.dialect())
            .field("tracked", &self.tracker.len())
            .finish()
    }
}

impl OrmContext {
    /// Context over an existing pool with a fresh tracker
    pub fn new(pool: Arc<dyn DatabasePool>) -> Self {
        Self::with_tracker(pool, SavedObjectTracker::new())
    }

    /// Context sharing an existing tracker, e.g. per session
    pub fn with_tracker(pool: Arc<dyn DatabasePool>, tracker: SavedObjectTracker) -> Self {
        Self { pool, tracker }
    }

    /// Connect through the bundled backends, picking one from the URL scheme
    pub async fn connect(database_url: &str, config: DatabasePoolConfig) -> OrmResult<Self> {
        let registry = DatabaseBackendRegistry::with_defaults();
        let pool = registry.create_pool(database_url, config).await?;
        info!(dialect = ?pool.dialect(), "database pool created");
        Ok(Self::new(pool))
    }

    /// Connect using `JOINERY_DATABASE_URL` and `JOINERY_DB_*` pool settings
    pub async fn from_env() -> OrmResult<Self> {
        let url = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| OrmError::Configuration(format!("{} is not set", DATABASE_URL_ENV)))?;
        Self::connect(&url, DatabasePoolConfig::from_env()?).await
    }

    pub fn dialect(&self) -> SqlDialect {
        self.pool.dialect()
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    pub fn tracker(&self) -> &SavedObjectTracker {
        &self.tracker
    }

    /// Begin a transaction the caller commits or rolls back
    pub async fn begin(&self) -> OrmResult<Transaction> {
        Transaction::begin(self.pool.as_ref()).await
    }

    /// Run `f` in a transaction with automatic commit or rollback
    ///
    /// ```ignore
    /// let affected = ctx
    ///     .transaction(|tx| Box::pin(async move { tx.execute("DELETE FROM posts", &[]).await }))
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, f: F) -> OrmResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, OrmResult<T>> + Send,
    {
        with_transaction(self.pool.as_ref(), f).await
    }

    pub async fn close(&self) -> OrmResult<()> {
        self.pool.close().await
    }
}
