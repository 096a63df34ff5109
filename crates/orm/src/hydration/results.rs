//! Result cursor over one executed query
//!
//! Owns the transaction the query ran in. Rows can be streamed one by one,
//! written in batches while the transaction stays open, or drained with a
//! final commit. Any row that fails to materialize rolls the transaction back
//! and leaves the caller's containers and the saved-object tracker untouched.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use super::containers::{Destination, MaterializedRow};
use super::mapping::{plan_columns, ColumnTarget};
use crate::backends::DatabaseRow;
use crate::error::{OrmError, OrmResult};
use crate::model::{PendingRecord, SavedObjectTracker};
use crate::query::AliasTable;
use crate::transaction::Transaction;

/// Rows of an executed query, materialized on demand
pub struct Results {
    tx: Option<Transaction>,
    rows: VecDeque<Box<dyn DatabaseRow>>,
    aliases: AliasTable,
    plan: Option<Vec<ColumnTarget>>,
    tracker: SavedObjectTracker,
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results")
            .field("remaining", &self.rows.len())
            .field("open", &self.tx.is_some())
            .finish()
    }
}

impl Results {
    pub(crate) fn new(
        tx: Transaction,
        rows: Vec<Box<dyn DatabaseRow>>,
        aliases: AliasTable,
        tracker: SavedObjectTracker,
    ) -> Self {
        debug!(rows = rows.len(), "query results received");
        Self {
            tx: Some(tx),
            rows: rows.into(),
            aliases,
            plan: None,
            tracker,
        }
    }

    /// Rows not yet materialized
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Next row, or `None` once drained
    pub async fn next_row(&mut self) -> OrmResult<Option<MaterializedRow>> {
        let Some(row) = self.rows.pop_front() else {
            return Ok(None);
        };
        let mut pending = Vec::new();
        match self.materialize(row.as_ref(), &mut pending) {
            Ok(materialized) => {
                self.tracker.apply(pending);
                Ok(Some(materialized))
            }
            Err(err) => Err(self.abort(err).await),
        }
    }

    /// Write up to `n` rows into `dest`, keeping the transaction open
    ///
    /// Returns the number of rows written. On failure nothing is written and
    /// the transaction is rolled back.
    pub async fn write_n<D: Destination>(&mut self, n: usize, dest: &mut D) -> OrmResult<usize> {
        let take = n.min(self.rows.len());
        let batch: Vec<_> = self.rows.drain(..take).collect();
        match self.stage::<D>(&batch) {
            Ok((staged, pending)) => {
                self.tracker.apply(pending);
                dest.merge(staged);
                Ok(take)
            }
            Err(err) => Err(self.abort(err).await),
        }
    }

    /// Write every remaining row into `dest` and commit
    ///
    /// On failure the transaction is rolled back and `dest` is left as it was.
    pub async fn write_all_to<D: Destination>(mut self, dest: &mut D) -> OrmResult<usize> {
        let batch: Vec<_> = self.rows.drain(..).collect();
        let (staged, pending) = match self.stage::<D>(&batch) {
            Ok(staged) => staged,
            Err(err) => return Err(self.abort(err).await),
        };

        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        self.tracker.apply(pending);
        dest.merge(staged);
        Ok(batch.len())
    }

    /// Commit and release the transaction, discarding unread rows
    pub async fn close(mut self) -> OrmResult<()> {
        self.rows.clear();
        match self.tx.take() {
            Some(tx) => tx.commit().await,
            None => Ok(()),
        }
    }

    /// Materialize a whole batch; tracker records are returned, not applied
    fn stage<D: Destination>(&mut self, rows: &[Box<dyn DatabaseRow>]) -> OrmResult<(D, Vec<PendingRecord>)> {
        let mut staged = D::default();
        let mut pending = Vec::new();
        for row in rows {
            let mut materialized = self.materialize(row.as_ref(), &mut pending)?;
            staged.accept(&mut materialized)?;
        }
        Ok((staged, pending))
    }

    fn materialize(
        &mut self,
        row: &dyn DatabaseRow,
        pending: &mut Vec<PendingRecord>,
    ) -> OrmResult<MaterializedRow> {
        if self.tx.is_none() {
            return Err(OrmError::Transaction(
                "Results were rolled back after an earlier failure".to_string(),
            ));
        }
        if self.plan.is_none() {
            self.plan = Some(plan_columns(&row.column_names(), &self.aliases)?);
        }
        let plan = self.plan.as_deref().unwrap_or_default();
        let entities = self.aliases.entities();

        let mut instances: Vec<Option<Box<dyn crate::model::DynEntity>>> =
            (0..entities.len()).map(|_| None).collect();

        for (index, target) in plan.iter().enumerate() {
            let value = row.get_by_index(index)?;
            trace!(entity = entities[target.entity].type_name(), field = target.field, "scanning column");
            let instance = instances[target.entity].get_or_insert_with(|| entities[target.entity].instantiate());
            instance.set_field_dyn(target.field, value).map_err(|err| match err {
                OrmError::Materialization(msg) => OrmError::Materialization(format!(
                    "{}.{}: {}",
                    entities[target.entity].type_name(),
                    target.field,
                    msg
                )),
                other => other,
            })?;
        }

        let mut materialized = MaterializedRow::default();
        for (descriptor, instance) in entities.iter().zip(instances) {
            if let Some(instance) = instance {
                pending.extend(SavedObjectTracker::pending(descriptor, instance.as_ref()));
                materialized.insert(descriptor.type_id(), instance);
            }
        }
        Ok(materialized)
    }

    async fn abort(&mut self, err: OrmError) -> OrmError {
        self.rows.clear();
        if let Some(tx) = self.tx.take() {
            warn!(error = %err, "materialization failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
        }
        err
    }
}
