//! The pipeline orchestrator.
//!
//! Drives one submission through validation, the write-before-call
//! persistence hook, the three provider phases, and the closing
//! persistence hook. The orchestrator is the only place that decides
//! between local recovery (none, beyond the client's bounded poll loop)
//! and surfacing a classified error; callers wanting a retry start a
//! fresh `analyze` call, which gets a fresh record and audit trail.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lumiscan_provider::VisionClient;
use lumiscan_store::{AuditRecorder, FailureEvent, FailureLog, ObjectStore, RecordStore};
use lumiscan_types::{
    AnalysisRecord, ClassifiedError, ErrorInfo, ErrorKind, LumiscanConfig, LumiscanError,
    PipelineConfig, ProviderOutcome, Result,
};

use crate::validate::validate_image;

/// What one `analyze` call produced.
///
/// `record` is the durable state as persisted (absent when the submission
/// was rejected before a record was created); `error` carries the
/// classified, user-facing failure when `success` is false.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub record: Option<AnalysisRecord>,
    pub error: Option<ErrorInfo>,
}

impl AnalysisOutcome {
    fn completed(record: Option<AnalysisRecord>) -> Self {
        Self {
            success: true,
            record,
            error: None,
        }
    }

    fn failed(record: Option<AnalysisRecord>, error: ErrorInfo) -> Self {
        Self {
            success: false,
            record,
            error: Some(error),
        }
    }

    /// The classified failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Orchestrates the end-to-end analysis state machine.
///
/// All collaborators are injected at construction; the pipeline holds no
/// process-wide state and each `analyze` call is an independent unit of
/// concurrent execution.
pub struct AnalysisPipeline {
    client: Arc<VisionClient>,
    recorder: AuditRecorder,
    records: Arc<dyn RecordStore>,
    failures: Arc<dyn FailureLog>,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(
        client: Arc<VisionClient>,
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        failures: Arc<dyn FailureLog>,
        config: &LumiscanConfig,
    ) -> Self {
        Self {
            client,
            recorder: AuditRecorder::new(records.clone(), objects, &config.storage),
            records,
            failures,
            config: config.pipeline.clone(),
        }
    }

    /// Run one submission through the full pipeline.
    ///
    /// Identical resubmissions are *not* deduplicated: every call creates
    /// its own record with its own id and audit trail.
    ///
    /// Callers whose request context may disconnect should spawn this
    /// future so it runs to completion -- the record, not the original
    /// request, is the durable source of truth, and its status is
    /// re-fetchable by id via [`AnalysisPipeline::get_analysis`].
    pub async fn analyze(
        &self,
        user_id: &str,
        image: &[u8],
        metadata: HashMap<String, Value>,
    ) -> AnalysisOutcome {
        info!(user_id, bytes = image.len(), "starting skin analysis");

        // Entry validation: no record, no network for unusable images.
        let dims = match validate_image(image, &self.config) {
            Ok(dims) => dims,
            Err(err) => {
                warn!(user_id, kind = %err.kind(), detail = err.detail(), "image rejected at entry");
                self.log_failure(user_id, &err, None).await;
                return AnalysisOutcome::failed(None, err.info);
            }
        };
        debug!(width = dims.width, height = dims.height, "image accepted");

        // Data sovereignty: the submission is durable before any provider
        // contact, or the pipeline stops here.
        let record = match self.recorder.pre_call(user_id, image, metadata).await {
            Ok(record) => record,
            Err(e) => {
                error!(user_id, error = %e, "pre-call persistence failed, provider not contacted");
                let err = ClassifiedError::from_kind(ErrorKind::InvalidImage)
                    .with_raw(e.to_string());
                self.log_failure(user_id, &err, None).await;
                return AnalysisOutcome::failed(None, err.info);
            }
        };
        let record_id = record.id;

        // Phase 1: reserve the upload slot.
        let slot = match self.client.reserve_upload_slot("jpg").await {
            Ok(slot) => slot,
            Err(err) => return self.fail_phase(record_id, user_id, err, None).await,
        };
        if let Err(e) = self.recorder.slot_reserved(record_id, &slot.session_id).await {
            warn!(record_id = %record_id, error = %e, "failed to persist slot reservation");
        }

        // Phase 2: upload the image bytes.
        if let Err(err) = self.client.upload_image(&slot.upload_url, image).await {
            return self
                .fail_phase(record_id, user_id, err, Some(&slot.session_id))
                .await;
        }
        if let Err(e) = self.recorder.image_uploaded(record_id).await {
            warn!(record_id = %record_id, error = %e, "failed to persist upload stage");
        }

        // Phase 3: poll for the result, then close the record out.
        match self.client.poll_analysis(&slot.session_id).await {
            Ok(analysis) => {
                let outcome = ProviderOutcome::Success {
                    metrics: analysis.metrics,
                    raw: analysis.raw,
                };
                if let Err(e) = self
                    .recorder
                    .post_call(record_id, &outcome, Some(&slot.session_id))
                    .await
                {
                    // The provider result is already in hand; a persistence
                    // failure is logged but never masks the success.
                    error!(record_id = %record_id, error = %e, "failed to persist completed analysis");
                }
                info!(record_id = %record_id, user_id, "skin analysis completed");
                AnalysisOutcome::completed(self.fetch(record_id).await)
            }
            Err(err) => {
                warn!(
                    record_id = %record_id,
                    user_id,
                    kind = %err.kind(),
                    detail = err.detail(),
                    "provider analysis failed"
                );
                let outcome = ProviderOutcome::Failure {
                    kind: err.kind(),
                    detail: err.detail().to_string(),
                    raw: err.raw.as_deref().and_then(|r| serde_json::from_str(r).ok()),
                };
                if let Err(e) = self
                    .recorder
                    .post_call(record_id, &outcome, Some(&slot.session_id))
                    .await
                {
                    error!(record_id = %record_id, error = %e, "failed to persist failed analysis");
                }
                self.log_failure(user_id, &err, Some(&slot.session_id)).await;
                AnalysisOutcome::failed(self.fetch(record_id).await, err.info)
            }
        }
    }

    /// Fetch one analysis record for downstream consumers.
    pub async fn get_analysis(&self, id: Uuid) -> Result<AnalysisRecord> {
        self.records
            .find_by_id(id)
            .await?
            .ok_or(LumiscanError::RecordNotFound { id })
    }

    /// All of a user's analyses, newest first.
    pub async fn list_analyses(&self, user_id: &str) -> Result<Vec<AnalysisRecord>> {
        self.records.find_by_user(user_id).await
    }

    /// Close out a record for a failure in the slot or upload phase.
    async fn fail_phase(
        &self,
        record_id: Uuid,
        user_id: &str,
        err: ClassifiedError,
        session_id: Option<&str>,
    ) -> AnalysisOutcome {
        warn!(
            record_id = %record_id,
            user_id,
            kind = %err.kind(),
            detail = err.detail(),
            "analysis phase failed"
        );
        if let Err(e) = self
            .recorder
            .mark_failed(record_id, err.kind(), err.detail())
            .await
        {
            error!(record_id = %record_id, error = %e, "failed to persist phase failure");
        }
        self.log_failure(user_id, &err, session_id).await;
        AnalysisOutcome::failed(self.fetch(record_id).await, err.info)
    }

    async fn log_failure(&self, user_id: &str, err: &ClassifiedError, session_id: Option<&str>) {
        self.failures
            .log_failure(FailureEvent::new(
                user_id,
                err.kind(),
                err.detail(),
                session_id.map(String::from),
            ))
            .await;
    }

    async fn fetch(&self, id: Uuid) -> Option<AnalysisRecord> {
        match self.records.find_by_id(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(record_id = %id, error = %e, "failed to re-fetch record");
                None
            }
        }
    }
}
