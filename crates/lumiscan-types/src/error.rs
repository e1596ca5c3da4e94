//! Error types for lumiscan's storage and configuration plumbing.
//!
//! [`LumiscanError`] covers failures internal to this system: the record
//! store, object storage, and configuration loading. Provider failures are
//! *not* represented here -- they travel through the pipeline as
//! [`ClassifiedError`](crate::classify::ClassifiedError) values so that
//! every phase returns a user-actionable category instead of a raw cause.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for storage, persistence, and configuration.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LumiscanError {
    /// An object-storage or record-store operation failed.
    #[error("storage failure: {reason}")]
    Storage {
        /// What the backing store reported.
        reason: String,
    },

    /// No analysis record exists with the given id.
    #[error("analysis record not found: {id}")]
    RecordNotFound {
        /// The id that was looked up.
        id: Uuid,
    },

    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, LumiscanError>;
