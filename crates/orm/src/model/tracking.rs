//! Saved-object tracking
//!
//! Remembers the column values an entity had when it was last written or
//! loaded, keyed by table and primary key. `update` diffs against this to
//! skip unchanged columns. The tracker lives in an [`OrmContext`] rather than
//! in process-wide state, so tests and requests do not see each other's
//! objects.
//!
//! [`OrmContext`]: crate::database::OrmContext

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::descriptor::{DynEntity, EntityDescriptor};
use crate::backends::DatabaseValue;

/// Column → value snapshot of one entity
pub type Snapshot = HashMap<String, DatabaseValue>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrackerKey {
    table: String,
    key: String,
}

/// A snapshot taken now and recorded once the surrounding work succeeds
#[derive(Debug, Clone)]
pub struct PendingRecord {
    key: TrackerKey,
    snapshot: Snapshot,
}

/// Concurrent map of saved entities; clones share state
#[derive(Debug, Clone, Default)]
pub struct SavedObjectTracker {
    saved: Arc<DashMap<TrackerKey, Snapshot>>,
}

impl SavedObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_of(descriptor: &EntityDescriptor, entity: &dyn DynEntity) -> Option<TrackerKey> {
        let values = descriptor.key_values(entity)?;
        let key = values
            .iter()
            .map(|(column, value)| format!("{}={}", column, value.to_sql_literal()))
            .collect::<Vec<_>>()
            .join(",");
        Some(TrackerKey {
            table: descriptor.table().to_string(),
            key,
        })
    }

    /// Record the current state of an entity; entities without a complete
    /// key are not tracked
    pub fn record(&self, descriptor: &EntityDescriptor, entity: &dyn DynEntity) {
        if let Some(key) = Self::key_of(descriptor, entity) {
            self.saved.insert(key, descriptor.snapshot(entity));
        }
    }

    /// Capture an entity's state without recording it yet
    pub fn pending(descriptor: &EntityDescriptor, entity: &dyn DynEntity) -> Option<PendingRecord> {
        Self::key_of(descriptor, entity).map(|key| PendingRecord {
            key,
            snapshot: descriptor.snapshot(entity),
        })
    }

    pub fn apply(&self, records: impl IntoIterator<Item = PendingRecord>) {
        for record in records {
            self.saved.insert(record.key, record.snapshot);
        }
    }

    pub fn snapshot(&self, descriptor: &EntityDescriptor, entity: &dyn DynEntity) -> Option<Snapshot> {
        let key = Self::key_of(descriptor, entity)?;
        self.saved.get(&key).map(|entry| entry.value().clone())
    }

    pub fn is_saved(&self, descriptor: &EntityDescriptor, entity: &dyn DynEntity) -> bool {
        Self::key_of(descriptor, entity)
            .map(|key| self.saved.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn forget(&self, descriptor: &EntityDescriptor, entity: &dyn DynEntity) {
        if let Some(key) = Self::key_of(descriptor, entity) {
            self.saved.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_accessors;
    use crate::model::{descriptor_of, Entity, FieldMeta};

    #[derive(Debug, Clone, Default)]
    struct Gadget {
        id: Option<i32>,
        label: String,
    }

    impl Entity for Gadget {
        fn fields() -> Vec<FieldMeta> {
            vec![FieldMeta::named("id").primary_key(), FieldMeta::named("label")]
        }

        entity_accessors!(id, label);
    }

    #[test]
    fn test_record_and_forget() {
        let desc = descriptor_of::<Gadget>().unwrap();
        let tracker = SavedObjectTracker::new();
        let gadget = Gadget {
            id: Some(1),
            label: "lamp".to_string(),
        };

        assert!(!tracker.is_saved(&desc, &gadget));
        tracker.record(&desc, &gadget);
        assert!(tracker.is_saved(&desc, &gadget));
        assert_eq!(
            tracker.snapshot(&desc, &gadget).unwrap().get("label"),
            Some(&DatabaseValue::from("lamp"))
        );

        let shared = tracker.clone();
        shared.forget(&desc, &gadget);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_keyless_entities_are_not_tracked() {
        let desc = descriptor_of::<Gadget>().unwrap();
        let tracker = SavedObjectTracker::new();
        tracker.record(&desc, &Gadget::default());
        assert_eq!(tracker.len(), 0);
        assert!(SavedObjectTracker::pending(&desc, &Gadget::default()).is_none());
    }

    #[test]
    fn test_pending_records_wait_for_apply() {
        let desc = descriptor_of::<Gadget>().unwrap();
        let tracker = SavedObjectTracker::new();
        let gadget = Gadget {
            id: Some(2),
            label: "fan".to_string(),
        };

        let pending = SavedObjectTracker::pending(&desc, &gadget).unwrap();
        assert!(tracker.is_empty());

        tracker.apply([pending]);
        assert!(tracker.is_saved(&desc, &gadget));
    }
}
