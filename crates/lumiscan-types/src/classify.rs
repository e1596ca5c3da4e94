//! Provider failure classification.
//!
//! The remote analysis provider fails in many shapes: structured JSON error
//! payloads, bare status-line strings, transport errors. [`classify`] maps
//! any of them onto the fixed [`ErrorKind`] taxonomy and returns an
//! [`ErrorInfo`] with user-facing copy and a retryability flag. It never
//! fails itself -- unrecognized input becomes [`ErrorKind::Unknown`].
//!
//! Matching is case-insensitive substring scanning in a fixed priority
//! order; the first match wins. Structured payloads are searched at
//! `error.message`, `error.description`, and a top-level `message` field.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The fixed set of failure categories surfaced to callers.
///
/// Every phase of the pipeline reports failures as one of these kinds;
/// logging and user messaging both key off the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FaceNotDetected,
    ImageTooSmall,
    OutOfFocus,
    AngleTilted,
    NetworkError,
    Timeout,
    UploadSlotFailed,
    UploadFailed,
    AnalysisFailed,
    InvalidImage,
    ProviderAuthError,
    RateLimited,
    ProviderServerError,
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 14] = [
        ErrorKind::FaceNotDetected,
        ErrorKind::ImageTooSmall,
        ErrorKind::OutOfFocus,
        ErrorKind::AngleTilted,
        ErrorKind::NetworkError,
        ErrorKind::Timeout,
        ErrorKind::UploadSlotFailed,
        ErrorKind::UploadFailed,
        ErrorKind::AnalysisFailed,
        ErrorKind::InvalidImage,
        ErrorKind::ProviderAuthError,
        ErrorKind::RateLimited,
        ErrorKind::ProviderServerError,
        ErrorKind::Unknown,
    ];

    /// Stable snake_case code used in logs, responses, and persistence.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::FaceNotDetected => "face_not_detected",
            ErrorKind::ImageTooSmall => "image_too_small",
            ErrorKind::OutOfFocus => "out_of_focus",
            ErrorKind::AngleTilted => "angle_tilted",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UploadSlotFailed => "upload_slot_failed",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::AnalysisFailed => "analysis_failed",
            ErrorKind::InvalidImage => "invalid_image",
            ErrorKind::ProviderAuthError => "provider_auth_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ProviderServerError => "provider_server_error",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Whether resubmitting can plausibly succeed.
    ///
    /// [`ErrorKind::ProviderAuthError`] signals a credential/configuration
    /// problem -- an operational incident, not something the user can fix
    /// by retaking the photo. Every other kind is retryable.
    pub fn retryable(self) -> bool {
        !matches!(self, ErrorKind::ProviderAuthError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A classified failure with user-facing copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// The classified category, serialized as its snake_case code.
    #[serde(rename = "code")]
    pub kind: ErrorKind,

    /// Short headline shown to the user.
    pub title: String,

    /// What went wrong, in user terms.
    pub message: String,

    /// What the user should do next.
    pub action: String,

    /// Whether the user should be prompted to retake/resubmit.
    pub retryable: bool,
}

impl ErrorInfo {
    /// The canonical user-facing copy for a kind.
    pub fn for_kind(kind: ErrorKind) -> Self {
        let (title, message, action) = match kind {
            ErrorKind::FaceNotDetected => (
                "No Face Detected",
                "We couldn't find a face in the photo. Make sure your face is clearly visible and centered in the frame.",
                "Retake the photo with better lighting and your face centered.",
            ),
            ErrorKind::ImageTooSmall => (
                "Image Quality Too Low",
                "The image resolution is too small for an accurate analysis. Photos need to be at least 500x500 pixels.",
                "Take a higher-resolution photo or move closer to the camera.",
            ),
            ErrorKind::OutOfFocus => (
                "Photo Is Blurry",
                "The photo is out of focus. A sharp image is required for skin analysis.",
                "Hold the device steady and tap to focus on your face before shooting.",
            ),
            ErrorKind::AngleTilted => (
                "Face Angle Issue",
                "Your face appears tilted or turned away from the camera.",
                "Look straight at the camera with your face level and centered.",
            ),
            ErrorKind::NetworkError => (
                "Connection Problem",
                "We couldn't reach the analysis service.",
                "Check your internet connection and try again.",
            ),
            ErrorKind::Timeout => (
                "Analysis Taking Too Long",
                "The analysis did not finish in the expected time.",
                "This is usually temporary server load. Try again in a few moments.",
            ),
            ErrorKind::UploadSlotFailed => (
                "Upload Preparation Failed",
                "We couldn't prepare your photo for analysis.",
                "Try again; contact support if the problem persists.",
            ),
            ErrorKind::UploadFailed => (
                "Photo Upload Failed",
                "Your photo could not be uploaded for analysis.",
                "Check your internet connection and try again.",
            ),
            ErrorKind::AnalysisFailed => (
                "Analysis Failed",
                "Something went wrong while analyzing your skin.",
                "Retake the photo in good lighting and try again.",
            ),
            ErrorKind::InvalidImage => (
                "Invalid Image",
                "The image could not be read. Use a JPEG or PNG photo.",
                "Take a new photo or pick a different image.",
            ),
            ErrorKind::ProviderAuthError => (
                "Configuration Error",
                "The analysis service rejected our credentials.",
                "No action needed on your side; the team has been notified.",
            ),
            ErrorKind::RateLimited => (
                "Too Many Requests",
                "You've hit the analysis limit for now.",
                "Wait a few minutes before trying again.",
            ),
            ErrorKind::ProviderServerError => (
                "Service Unavailable",
                "The analysis service is having trouble right now.",
                "Try again later; contact support if the problem persists.",
            ),
            ErrorKind::Unknown => (
                "Unexpected Error",
                "Something unexpected went wrong with the analysis.",
                "Try again, or contact support if the problem continues.",
            ),
        };
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            action: action.into(),
            retryable: kind.retryable(),
        }
    }
}

/// A provider phrase and the kind it maps to.
struct PhrasePattern {
    needle: &'static str,
    kind: ErrorKind,
}

/// Known provider error phrases, checked in priority order (first match
/// wins). Needles are lowercase; haystacks are lowercased before scanning.
const PROVIDER_PHRASES: &[PhrasePattern] = &[
    PhrasePattern {
        needle: "face not detected",
        kind: ErrorKind::FaceNotDetected,
    },
    PhrasePattern {
        needle: "image resolution is too small",
        kind: ErrorKind::ImageTooSmall,
    },
    PhrasePattern {
        needle: "face is out of focus",
        kind: ErrorKind::OutOfFocus,
    },
    PhrasePattern {
        needle: "face angle tilted",
        kind: ErrorKind::AngleTilted,
    },
];

/// Scan a lowercased haystack against the provider phrase table, then
/// against the stable kind codes themselves.
fn match_phrases(lower: &str) -> Option<ErrorKind> {
    for pattern in PROVIDER_PHRASES {
        if lower.contains(pattern.needle) {
            return Some(pattern.kind);
        }
    }
    ErrorKind::ALL
        .into_iter()
        .find(|kind| *kind != ErrorKind::Unknown && lower.contains(kind.code()))
}

/// Classify a plain-text failure signal.
///
/// Substring rules are applied in a fixed priority order; the first match
/// wins. Anything unmatched falls back to the provider phrase table and
/// finally to [`ErrorKind::Unknown`].
pub fn classify_text(signal: &str) -> ErrorKind {
    let lower = signal.to_lowercase();
    if lower.contains("timeout") {
        return ErrorKind::Timeout;
    }
    if lower.contains("network") || lower.contains("connection") {
        return ErrorKind::NetworkError;
    }
    if lower.contains("upload") {
        return ErrorKind::UploadFailed;
    }
    if lower.contains("presigned") {
        return ErrorKind::UploadSlotFailed;
    }
    if lower.contains("rate") && lower.contains("limit") {
        return ErrorKind::RateLimited;
    }
    if lower.contains("401") || lower.contains("unauthorized") {
        return ErrorKind::ProviderAuthError;
    }
    if lower.contains("500") || lower.contains("server") {
        return ErrorKind::ProviderServerError;
    }
    match_phrases(&lower).unwrap_or(ErrorKind::Unknown)
}

/// Candidate texts to scan inside a structured payload, in search order:
/// nested `error.message`, nested `error.description`, top-level `message`.
fn candidate_texts(payload: &Value) -> Vec<&str> {
    let mut texts = Vec::new();
    if let Some(error) = payload.get("error") {
        match error {
            Value::Object(obj) => {
                if let Some(message) = obj.get("message").and_then(Value::as_str) {
                    texts.push(message);
                }
                if let Some(description) = obj.get("description").and_then(Value::as_str) {
                    texts.push(description);
                }
            }
            Value::String(s) => texts.push(s.as_str()),
            _ => {}
        }
    }
    if let Some(message) = payload.get("message").and_then(Value::as_str) {
        texts.push(message);
    }
    texts
}

/// Classify a structured failure payload.
///
/// Provider phrases are checked first (they are the most specific), then
/// the generic text rules are applied to the same candidate fields.
pub fn classify_payload(payload: &Value) -> ErrorKind {
    let texts = candidate_texts(payload);
    for text in &texts {
        if let Some(kind) = match_phrases(&text.to_lowercase()) {
            return kind;
        }
    }
    for text in &texts {
        let kind = classify_text(text);
        if kind != ErrorKind::Unknown {
            return kind;
        }
    }
    ErrorKind::Unknown
}

/// A raw failure signal: either free text or a structured payload.
#[derive(Debug, Clone, Copy)]
pub enum RawSignal<'a> {
    Text(&'a str),
    Payload(&'a Value),
}

impl<'a> From<&'a str> for RawSignal<'a> {
    fn from(text: &'a str) -> Self {
        RawSignal::Text(text)
    }
}

impl<'a> From<&'a Value> for RawSignal<'a> {
    fn from(payload: &'a Value) -> Self {
        RawSignal::Payload(payload)
    }
}

/// Classify any raw failure signal into an [`ErrorInfo`].
///
/// Never fails: unrecognized signals map to [`ErrorKind::Unknown`], which
/// is retryable.
pub fn classify<'a>(signal: impl Into<RawSignal<'a>>) -> ErrorInfo {
    let kind = match signal.into() {
        RawSignal::Text(text) => classify_text(text),
        RawSignal::Payload(payload) => classify_payload(payload),
    };
    ErrorInfo::for_kind(kind)
}

/// A classified failure threaded through the pipeline phases.
///
/// `raw` carries the technical detail (provider payload, transport error
/// text) for the audit trail and monitoring logs. It is never part of
/// anything returned to end callers -- see [`to_response`].
#[derive(Debug, Clone, Error)]
#[error("{}: {}", .info.kind, .info.message)]
pub struct ClassifiedError {
    /// The classification with user-facing copy.
    pub info: ErrorInfo,

    /// Raw technical detail, for logging and the audit trail only.
    pub raw: Option<String>,
}

impl ClassifiedError {
    /// Build from an already-known kind.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            info: ErrorInfo::for_kind(kind),
            raw: None,
        }
    }

    /// Classify a raw signal, keeping its text as the technical detail.
    pub fn from_signal<'a>(signal: impl Into<RawSignal<'a>>) -> Self {
        let signal = signal.into();
        let info = classify(signal);
        let raw = match signal {
            RawSignal::Text(text) => Some(text.to_string()),
            RawSignal::Payload(payload) => Some(payload.to_string()),
        };
        Self { info, raw }
    }

    /// Attach technical detail.
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Replace an [`ErrorKind::Unknown`] classification with a
    /// phase-specific kind. More specific classifications are kept.
    pub fn or_kind(self, kind: ErrorKind) -> Self {
        if self.info.kind == ErrorKind::Unknown {
            Self {
                info: ErrorInfo::for_kind(kind),
                raw: self.raw,
            }
        } else {
            self
        }
    }

    /// The classified category.
    pub fn kind(&self) -> ErrorKind {
        self.info.kind
    }

    /// Whether resubmitting can plausibly succeed.
    pub fn retryable(&self) -> bool {
        self.info.retryable
    }

    /// The technical detail for audit/log purposes, falling back to the
    /// user message when no raw signal was captured.
    pub fn detail(&self) -> &str {
        self.raw.as_deref().unwrap_or(&self.info.message)
    }
}

/// The envelope returned to API callers for a failed analysis.
///
/// Contains only the classified user-facing copy plus correlation
/// metadata -- never the raw provider payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Wrap a classification with correlation metadata for an API response and
/// emit a structured log line for monitoring.
pub fn to_response(
    info: &ErrorInfo,
    request_id: Option<&str>,
    user_id: Option<&str>,
) -> ErrorResponse {
    tracing::warn!(
        kind = %info.kind,
        retryable = info.retryable,
        request_id = request_id.unwrap_or("-"),
        user_id = user_id.unwrap_or("-"),
        "analysis error surfaced to caller"
    );
    ErrorResponse {
        success: false,
        error: info.clone(),
        request_id: request_id.map(String::from),
        timestamp: Utc::now(),
    }
}
