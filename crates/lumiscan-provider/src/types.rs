//! Wire types for the provider protocol.
//!
//! Each provider response is decoded exactly once, at the HTTP boundary,
//! into these tagged structs; nothing downstream does ad hoc key lookups
//! on raw JSON. Field renames mirror the provider's camelCase payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lumiscan_types::SkinMetrics;

/// Envelope for `GET /image` (upload-slot reservation).
#[derive(Debug, Clone, Deserialize)]
pub struct SlotEnvelope {
    pub data: SlotData,
}

/// Payload of a successful slot reservation.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotData {
    /// Time-limited destination URL for the image `PUT`.
    #[serde(rename = "uploadSignedUrl")]
    pub upload_signed_url: String,

    /// Provider session id correlating the upload with its result.
    pub session_id: String,
}

/// A reserved upload slot, as handed to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSlot {
    pub upload_url: String,
    pub session_id: String,
}

/// Envelope for `GET /analysis` (result polling).
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisEnvelope {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub data: Option<AnalysisData>,

    /// Provider error payload, when the analysis failed terminally.
    #[serde(default)]
    pub error: Option<Value>,
}

/// Payload of a finished analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisData {
    #[serde(default)]
    pub output_score: Vec<ConcernScore>,

    /// Provider-side reference to the analyzed image.
    #[serde(default)]
    pub input_image: Option<String>,

    /// Per-concern overlay annotations (opaque to this subsystem).
    #[serde(default)]
    pub annotations: Option<Value>,
}

/// One scored concern. Higher score is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcernScore {
    pub concern: String,
    pub score: f64,

    #[serde(rename = "riskLevel", default)]
    pub risk_level: Option<String>,
}

/// A normalized, successful analysis result.
#[derive(Debug, Clone)]
pub struct AnalysisSuccess {
    /// The ten normalized metrics.
    pub metrics: SkinMetrics,

    /// The provider's full concern list, as scored.
    pub detailed_scores: Vec<ConcernScore>,

    /// Provider-side reference to the analyzed image.
    pub input_image: Option<String>,

    /// Per-concern overlay annotations.
    pub annotations: Option<Value>,

    /// The complete raw response, retained for debugging only.
    pub raw: Value,
}
