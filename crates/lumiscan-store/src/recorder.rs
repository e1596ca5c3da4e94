//! The write-before-call audit recorder.
//!
//! [`AuditRecorder`] wraps every provider interaction in persistence:
//! [`AuditRecorder::pre_call`] runs strictly before the first network call
//! and makes the submission durable (internal image copy + record insert);
//! [`AuditRecorder::post_call`] / [`AuditRecorder::mark_failed`] close the
//! record out afterwards. Each transition appends exactly one audit entry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use lumiscan_types::record::stage;
use lumiscan_types::{
    AnalysisRecord, AnalysisStatus, AuditEntry, ErrorKind, ProviderOutcome, RecordPatch, Result,
    StorageConfig,
};

use crate::object_store::ObjectStore;
use crate::record_store::RecordStore;

/// Persistence middleware around the provider protocol.
pub struct AuditRecorder {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    key_prefix: String,
}

impl AuditRecorder {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            records,
            objects,
            key_prefix: config.key_prefix.clone(),
        }
    }

    /// Object-storage key for a submission's internal copy.
    fn image_key(&self, user_id: &str, record_id: Uuid) -> String {
        format!("{}/{}/{}/original.jpg", self.key_prefix, user_id, record_id)
    }

    /// Make the submission durable before any provider call.
    ///
    /// Copies the image into our object storage under a key derived from
    /// the user and the freshly generated record id, then inserts the
    /// record at [`AnalysisStatus::PendingUpload`] with its first audit
    /// entry. If either write fails, the pipeline must not contact the
    /// provider.
    pub async fn pre_call(
        &self,
        user_id: &str,
        image: &[u8],
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<AnalysisRecord> {
        let record_id = Uuid::new_v4();
        let key = self.image_key(user_id, record_id);
        let location = self.objects.put(image, &key).await?;

        let record = AnalysisRecord::with_id(record_id, user_id, location, metadata);
        self.records.insert(record.clone()).await?;

        info!(
            record_id = %record_id,
            user_id,
            bytes = image.len(),
            "analysis record created before provider contact"
        );
        Ok(record)
    }

    /// Record that the provider issued an upload slot and session id.
    pub async fn slot_reserved(&self, record_id: Uuid, session_id: &str) -> Result<()> {
        debug!(record_id = %record_id, session_id, "recording reserved slot");
        self.records
            .update(
                record_id,
                RecordPatch {
                    status: Some(AnalysisStatus::Uploading),
                    provider_session_id: Some(session_id.to_string()),
                    audit: vec![AuditEntry::now(
                        stage::SLOT_RESERVED,
                        format!("provider session {session_id}"),
                    )],
                    ..RecordPatch::default()
                },
            )
            .await
    }

    /// Record that the image bytes reached the provider's destination.
    pub async fn image_uploaded(&self, record_id: Uuid) -> Result<()> {
        debug!(record_id = %record_id, "recording completed upload");
        self.records
            .update(
                record_id,
                RecordPatch {
                    status: Some(AnalysisStatus::Polling),
                    audit: vec![AuditEntry::now(
                        stage::IMAGE_UPLOADED,
                        "image delivered to provider upload slot",
                    )],
                    ..RecordPatch::default()
                },
            )
            .await
    }

    /// Close the record out with the provider's terminal answer.
    ///
    /// A failure to persist here must not discard the provider result:
    /// the orchestrator logs this error separately and still returns the
    /// result to its caller.
    pub async fn post_call(
        &self,
        record_id: Uuid,
        outcome: &ProviderOutcome,
        provider_session_id: Option<&str>,
    ) -> Result<()> {
        let patch = match outcome {
            ProviderOutcome::Success { metrics, raw } => RecordPatch {
                status: Some(AnalysisStatus::Completed),
                provider_session_id: provider_session_id.map(String::from),
                metrics: Some(*metrics),
                raw_provider_response: Some(raw.clone()),
                audit: vec![AuditEntry::now(
                    stage::RESULTS_RECEIVED,
                    "provider analysis completed",
                )],
                ..RecordPatch::default()
            },
            ProviderOutcome::Failure { kind, detail, raw } => RecordPatch {
                status: Some(AnalysisStatus::Failed),
                provider_session_id: provider_session_id.map(String::from),
                raw_provider_response: raw.clone(),
                error_kind: Some(*kind),
                error_detail: Some(detail.clone()),
                audit: vec![AuditEntry::now(
                    stage::RESULTS_RECEIVED,
                    format!("provider analysis failed: {kind}"),
                )],
                ..RecordPatch::default()
            },
        };
        self.records.update(record_id, patch).await?;
        info!(record_id = %record_id, "analysis record closed out");
        Ok(())
    }

    /// Terminal failure transition for phases that never produced a
    /// provider result. Legal from any non-terminal status.
    pub async fn mark_failed(
        &self,
        record_id: Uuid,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Result<()> {
        let detail = detail.into();
        self.records
            .update(
                record_id,
                RecordPatch {
                    status: Some(AnalysisStatus::Failed),
                    error_kind: Some(kind),
                    error_detail: Some(detail.clone()),
                    audit: vec![AuditEntry::now(stage::ANALYSIS_FAILED, detail)],
                    ..RecordPatch::default()
                },
            )
            .await?;
        info!(record_id = %record_id, kind = %kind, "analysis marked failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::MemoryObjectStore;
    use crate::record_store::MemoryRecordStore;
    use lumiscan_types::SkinMetrics;
    use serde_json::json;

    struct Fixture {
        recorder: AuditRecorder,
        records: Arc<MemoryRecordStore>,
        objects: Arc<MemoryObjectStore>,
    }

    fn fixture() -> Fixture {
        let records = Arc::new(MemoryRecordStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let recorder = AuditRecorder::new(
            records.clone(),
            objects.clone(),
            &StorageConfig::default(),
        );
        Fixture {
            recorder,
            records,
            objects,
        }
    }

    #[tokio::test]
    async fn pre_call_stores_image_then_record() {
        let f = fixture();
        let record = f
            .recorder
            .pre_call("user-1", b"jpeg-bytes", HashMap::new())
            .await
            .unwrap();

        assert_eq!(record.status, AnalysisStatus::PendingUpload);
        assert_eq!(record.audit_trail.len(), 1);
        assert_eq!(record.audit_trail[0].stage, stage::IMAGE_STORED);
        assert!(record.internal_image_url.contains("user-1"));
        assert!(record.internal_image_url.contains(&record.id.to_string()));

        // Both the object and the record are durable.
        assert_eq!(f.objects.get(&record.internal_image_url).await.unwrap(), b"jpeg-bytes");
        assert!(f.records.find_by_id(record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stage_updates_advance_status_and_audit() {
        let f = fixture();
        let record = f
            .recorder
            .pre_call("user-1", b"img", HashMap::new())
            .await
            .unwrap();

        f.recorder.slot_reserved(record.id, "sess-7").await.unwrap();
        f.recorder.image_uploaded(record.id).await.unwrap();

        let stored = f.records.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Polling);
        assert_eq!(stored.provider_session_id.as_deref(), Some("sess-7"));
        let stages: Vec<&str> = stored.audit_trail.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(
            stages,
            vec![stage::IMAGE_STORED, stage::SLOT_RESERVED, stage::IMAGE_UPLOADED]
        );
    }

    #[tokio::test]
    async fn post_call_success_completes_record() {
        let f = fixture();
        let record = f
            .recorder
            .pre_call("user-1", b"img", HashMap::new())
            .await
            .unwrap();

        let metrics = SkinMetrics {
            hydration: 85.0,
            ..SkinMetrics::default()
        };
        let outcome = ProviderOutcome::Success {
            metrics,
            raw: json!({"success": true}),
        };
        f.recorder
            .post_call(record.id, &outcome, Some("sess-7"))
            .await
            .unwrap();

        let stored = f.records.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Completed);
        assert_eq!(stored.metrics.unwrap().hydration, 85.0);
        assert_eq!(stored.provider_session_id.as_deref(), Some("sess-7"));
        assert!(stored.raw_provider_response.is_some());
        assert!(stored.error_kind.is_none());
        assert_eq!(
            stored.audit_trail.last().unwrap().stage,
            stage::RESULTS_RECEIVED
        );
    }

    #[tokio::test]
    async fn post_call_failure_records_kind_and_raw() {
        let f = fixture();
        let record = f
            .recorder
            .pre_call("user-1", b"img", HashMap::new())
            .await
            .unwrap();

        let outcome = ProviderOutcome::Failure {
            kind: ErrorKind::FaceNotDetected,
            detail: "provider rejected the image".into(),
            raw: Some(json!({"error": {"message": "Face not detected"}})),
        };
        f.recorder
            .post_call(record.id, &outcome, Some("sess-7"))
            .await
            .unwrap();

        let stored = f.records.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Failed);
        assert_eq!(stored.error_kind, Some(ErrorKind::FaceNotDetected));
        assert_eq!(
            stored.error_detail.as_deref(),
            Some("provider rejected the image")
        );
        assert!(stored.metrics.is_none());
        assert!(stored.raw_provider_response.is_some());
    }

    #[tokio::test]
    async fn mark_failed_from_any_phase() {
        let f = fixture();

        // From PendingUpload.
        let r1 = f.recorder.pre_call("user-1", b"a", HashMap::new()).await.unwrap();
        f.recorder
            .mark_failed(r1.id, ErrorKind::UploadSlotFailed, "slot rejected")
            .await
            .unwrap();
        let stored = f.records.find_by_id(r1.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Failed);
        assert_eq!(stored.error_kind, Some(ErrorKind::UploadSlotFailed));
        assert_eq!(stored.audit_trail.last().unwrap().stage, stage::ANALYSIS_FAILED);

        // From Polling.
        let r2 = f.recorder.pre_call("user-1", b"b", HashMap::new()).await.unwrap();
        f.recorder.slot_reserved(r2.id, "sess-1").await.unwrap();
        f.recorder.image_uploaded(r2.id).await.unwrap();
        f.recorder
            .mark_failed(r2.id, ErrorKind::Timeout, "poll exhausted")
            .await
            .unwrap();
        let stored = f.records.find_by_id(r2.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Failed);
        assert_eq!(stored.audit_trail.len(), 4);
    }

    #[tokio::test]
    async fn pre_call_records_are_independent() {
        let f = fixture();
        let a = f.recorder.pre_call("user-1", b"same", HashMap::new()).await.unwrap();
        let b = f.recorder.pre_call("user-1", b"same", HashMap::new()).await.unwrap();
        // Identical bytes, same user: still two distinct records.
        assert_ne!(a.id, b.id);
        assert_eq!(f.records.len().await, 2);
        assert_eq!(f.objects.len().await, 2);
    }
}
