//! # lumiscan-types
//!
//! Core type definitions for the lumiscan skin-analysis acquisition
//! pipeline. This crate is the foundation of the dependency graph -- the
//! provider client, the persistence layer, and the pipeline orchestrator
//! all depend on it. It contains:
//!
//! - **[`record`]** -- [`AnalysisRecord`] and its append-only audit trail
//! - **[`metrics`]** -- the ten normalized [`SkinMetrics`] scores
//! - **[`classify`]** -- the [`ErrorKind`] taxonomy and the classifier that
//!   maps raw provider failures onto it
//! - **[`error`]** -- [`LumiscanError`] for storage/config plumbing
//! - **[`config`]** -- Configuration schema for the provider, storage, and
//!   pipeline layers

pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod record;

pub use classify::{
    ClassifiedError, ErrorInfo, ErrorKind, ErrorResponse, RawSignal, classify, to_response,
};
pub use config::{LumiscanConfig, PipelineConfig, StorageConfig, VisionProviderConfig};
pub use error::{LumiscanError, Result};
pub use metrics::SkinMetrics;
pub use record::{AnalysisRecord, AnalysisStatus, AuditEntry, ProviderOutcome, RecordPatch};
