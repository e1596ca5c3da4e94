//! Analysis records and their append-only audit trail.
//!
//! An [`AnalysisRecord`] is created *before* the first network call to the
//! provider and is the durable source of truth for a submission: callers
//! whose connection is lost re-fetch the record by id. Status moves
//! forward only (`PendingUpload -> Uploading -> Polling -> Completed |
//! Failed`) and every transition appends exactly one [`AuditEntry`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::ErrorKind;
use crate::metrics::SkinMetrics;

/// Audit-trail stage names.
pub mod stage {
    /// Image copied into our own object storage (first entry, pre-call).
    pub const IMAGE_STORED: &str = "image_stored_internally";
    /// Provider issued an upload slot and session id.
    pub const SLOT_RESERVED: &str = "upload_slot_reserved";
    /// Image bytes delivered to the provider's upload destination.
    pub const IMAGE_UPLOADED: &str = "image_uploaded";
    /// Provider returned a terminal result (success or failure).
    pub const RESULTS_RECEIVED: &str = "results_received";
    /// A phase failed before a provider result was obtained.
    pub const ANALYSIS_FAILED: &str = "analysis_failed";
}

/// Lifecycle state of an analysis submission. Monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    PendingUpload,
    Uploading,
    Polling,
    Completed,
    Failed,
}

impl AnalysisStatus {
    /// Stable snake_case name for logs and persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::PendingUpload => "pending_upload",
            AnalysisStatus::Uploading => "uploading",
            AnalysisStatus::Polling => "polling",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Whether this status ends the lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    /// Whether moving to `next` is a legal forward transition.
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        !self.is_terminal() && next > self
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a record's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Stage name, one of the [`stage`] constants.
    pub stage: String,

    /// When the transition happened.
    pub timestamp: DateTime<Utc>,

    /// Free-form technical detail for this transition.
    pub detail: String,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    pub fn now(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            timestamp: Utc::now(),
            detail: detail.into(),
        }
    }
}

/// The durable record of one analysis submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Internally generated id, stable for the record's lifetime.
    pub id: Uuid,

    /// Opaque reference to the owning user. Never mutated after creation.
    pub user_id: String,

    /// Object-storage location of the copy we control, written before any
    /// remote call is issued.
    pub internal_image_url: String,

    /// Provider-side session id, set once the upload slot is reserved.
    #[serde(default)]
    pub provider_session_id: Option<String>,

    /// Current lifecycle status.
    pub status: AnalysisStatus,

    /// Normalized scores; present only once `status` is `Completed`.
    #[serde(default)]
    pub metrics: Option<SkinMetrics>,

    /// Raw provider payload retained for debugging. Never shown to users.
    #[serde(default)]
    pub raw_provider_response: Option<serde_json::Value>,

    /// Classified failure category; present only when `status` is `Failed`.
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,

    /// Technical failure detail; present only when `status` is `Failed`.
    #[serde(default)]
    pub error_detail: Option<String>,

    /// Append-only stage history. One entry per state transition.
    #[serde(default)]
    pub audit_trail: Vec<AuditEntry>,

    /// Caller-supplied metadata about the submitted image.
    #[serde(default)]
    pub image_metadata: HashMap<String, serde_json::Value>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Create a record with a freshly generated id.
    ///
    /// Starts at [`AnalysisStatus::PendingUpload`] with the
    /// `image_stored_internally` audit entry already appended.
    pub fn new(
        user_id: impl Into<String>,
        internal_image_url: impl Into<String>,
        image_metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), user_id, internal_image_url, image_metadata)
    }

    /// Create a record with a caller-chosen id (the id also keys the
    /// object-storage path, so it must exist before the record does).
    pub fn with_id(
        id: Uuid,
        user_id: impl Into<String>,
        internal_image_url: impl Into<String>,
        image_metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.into(),
            internal_image_url: internal_image_url.into(),
            provider_session_id: None,
            status: AnalysisStatus::PendingUpload,
            metrics: None,
            raw_provider_response: None,
            error_kind: None,
            error_detail: None,
            audit_trail: vec![AuditEntry {
                stage: stage::IMAGE_STORED.into(),
                timestamp: now,
                detail: "image copied to internal storage before provider processing".into(),
            }],
            image_metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an audit entry and bump `updated_at`.
    pub fn push_audit(&mut self, stage: impl Into<String>, detail: impl Into<String>) {
        self.audit_trail.push(AuditEntry::now(stage, detail));
        self.updated_at = Utc::now();
    }

    /// Apply a typed patch. Backward status transitions are ignored;
    /// everything else is merged field by field.
    pub fn apply(&mut self, patch: RecordPatch) {
        if let Some(status) = patch.status
            && self.status.can_transition_to(status)
        {
            self.status = status;
        }
        if let Some(session_id) = patch.provider_session_id {
            self.provider_session_id = Some(session_id);
        }
        if let Some(metrics) = patch.metrics {
            self.metrics = Some(metrics);
        }
        if let Some(raw) = patch.raw_provider_response {
            self.raw_provider_response = Some(raw);
        }
        if let Some(kind) = patch.error_kind {
            self.error_kind = Some(kind);
        }
        if let Some(detail) = patch.error_detail {
            self.error_detail = Some(detail);
        }
        self.audit_trail.extend(patch.audit);
        self.updated_at = Utc::now();
    }
}

/// A typed update applied to a stored record by id.
///
/// Unset fields are left untouched; `audit` entries are appended.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub status: Option<AnalysisStatus>,
    pub provider_session_id: Option<String>,
    pub metrics: Option<SkinMetrics>,
    pub raw_provider_response: Option<serde_json::Value>,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    pub audit: Vec<AuditEntry>,
}

/// The provider's terminal answer for one submission, as recorded by the
/// persistence layer after the protocol finishes.
#[derive(Debug, Clone)]
pub enum ProviderOutcome {
    /// The provider completed the analysis.
    Success {
        /// Normalized scores.
        metrics: SkinMetrics,
        /// Full provider payload, retained for debugging.
        raw: serde_json::Value,
    },
    /// The provider (or the protocol around it) failed terminally.
    Failure {
        /// Classified failure category.
        kind: ErrorKind,
        /// Technical detail for the audit trail.
        detail: String,
        /// Provider payload, when one was received.
        raw: Option<serde_json::Value>,
    },
}
