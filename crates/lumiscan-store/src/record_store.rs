//! Keyed storage for analysis records.
//!
//! [`RecordStore`] is the minimal surface the audit recorder and the
//! downstream read API need: insert, patch by id, fetch by id, list by
//! user. Records are always accessed under a freshly generated unique id,
//! so implementations need no cross-record locking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use lumiscan_types::{AnalysisRecord, LumiscanError, RecordPatch, Result};

/// A keyed record store for [`AnalysisRecord`]s.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails if the id already exists.
    async fn insert(&self, record: AnalysisRecord) -> Result<()>;

    /// Apply a typed patch to the record with the given id.
    async fn update(&self, id: Uuid, patch: RecordPatch) -> Result<()>;

    /// Fetch a record by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AnalysisRecord>>;

    /// All records for a user, newest first.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AnalysisRecord>>;
}

/// In-memory record store backed by a keyed map.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<HashMap<Uuid, AnalysisRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (test helper).
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: AnalysisRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.id) {
            return Err(LumiscanError::Storage {
                reason: format!("record {} already exists", record.id),
            });
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: RecordPatch) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&id)
            .ok_or(LumiscanError::RecordNotFound { id })?;
        record.apply(patch);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AnalysisRecord>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<AnalysisRecord>> {
        let records = self.records.lock().await;
        let mut matching: Vec<AnalysisRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumiscan_types::{AnalysisStatus, AuditEntry, record::stage};
    use std::collections::HashMap as StdHashMap;

    fn record(user_id: &str) -> AnalysisRecord {
        AnalysisRecord::new(user_id, "mem://test/original.jpg", StdHashMap::new())
    }

    #[tokio::test]
    async fn insert_and_find() {
        let store = MemoryRecordStore::new();
        let r = record("user-1");
        let id = r.id;
        store.insert(r).await.unwrap();

        let found = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.status, AnalysisStatus::PendingUpload);

        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryRecordStore::new();
        let r = record("user-1");
        store.insert(r.clone()).await.unwrap();
        let err = store.insert(r).await.unwrap_err();
        assert!(matches!(err, LumiscanError::Storage { .. }));
    }

    #[tokio::test]
    async fn update_patches_in_place() {
        let store = MemoryRecordStore::new();
        let r = record("user-1");
        let id = r.id;
        store.insert(r).await.unwrap();

        store
            .update(
                id,
                RecordPatch {
                    status: Some(AnalysisStatus::Uploading),
                    provider_session_id: Some("sess-1".into()),
                    audit: vec![AuditEntry::now(stage::SLOT_RESERVED, "sess-1")],
                    ..RecordPatch::default()
                },
            )
            .await
            .unwrap();

        let found = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.status, AnalysisStatus::Uploading);
        assert_eq!(found.provider_session_id.as_deref(), Some("sess-1"));
        assert_eq!(found.audit_trail.len(), 2);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();
        let err = store.update(id, RecordPatch::default()).await.unwrap_err();
        assert!(matches!(err, LumiscanError::RecordNotFound { id: e } if e == id));
    }

    #[tokio::test]
    async fn find_by_user_sorts_newest_first() {
        let store = MemoryRecordStore::new();
        let first = record("user-1");
        // Force distinct creation times regardless of clock resolution.
        let mut second = record("user-1");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        let other = record("user-2");

        let first_id = first.id;
        let second_id = second.id;
        store.insert(first).await.unwrap();
        store.insert(second).await.unwrap();
        store.insert(other).await.unwrap();

        let listed = store.find_by_user("user-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second_id);
        assert_eq!(listed[1].id, first_id);
    }
}
