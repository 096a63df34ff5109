//! Query Builder execution
//!
//! Each execution acquires its own transaction from the context's pool.

use tracing::{debug, warn};

use super::builder::QueryBuilder;
use crate::backends::FromDatabaseValue;
use crate::database::OrmContext;
use crate::error::{DatabaseError, OrmResult};
use crate::hydration::{Destination, Results};
use crate::model::Entity;

impl QueryBuilder {
    /// Run the query and return a cursor over its rows
    ///
    /// Refuses to run when any builder mutation failed.
    pub async fn results(&self, ctx: &OrmContext) -> OrmResult<Results> {
        let query = self.build_execution_query()?;
        debug!(sql = %query.sql, args = query.args.len(), "running query");

        let mut tx = ctx.begin().await?;
        match tx.fetch_all(&query.sql, &query.args).await {
            Ok(rows) => Ok(Results::new(
                tx,
                rows,
                self.aliases.clone(),
                ctx.tracker().clone(),
            )),
            Err(err) => {
                warn!(error = %err, "query failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Run the query and collect every row into a fresh destination
    pub async fn fetch<D: Destination>(&self, ctx: &OrmContext) -> OrmResult<D> {
        let mut dest = D::default();
        self.results(ctx).await?.write_all_to(&mut dest).await?;
        Ok(dest)
    }

    /// First `E` matched by the query
    pub async fn first<E: Entity>(&self, ctx: &OrmContext) -> OrmResult<Option<E>> {
        let rows: Vec<E> = self.clone().limit(1).fetch(ctx).await?;
        Ok(rows.into_iter().next())
    }

    /// Number of rows matched, ignoring select and options
    pub async fn count(&self, ctx: &OrmContext) -> OrmResult<i64> {
        let query = self.build_count_query()?;
        ctx.transaction(move |tx| {
            Box::pin(async move {
                let row = tx
                    .fetch_optional(&query.sql, &query.args)
                    .await?
                    .ok_or_else(|| DatabaseError::no_rows("COUNT(*) returned no rows"))?;
                i64::from_database_value(row.get_by_index(0)?)
            })
        })
        .await
    }
}
