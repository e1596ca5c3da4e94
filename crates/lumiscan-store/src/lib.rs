//! Persistence layer for the lumiscan pipeline.
//!
//! The central guarantee here is data sovereignty: [`AuditRecorder::pre_call`]
//! copies the submitted image into *our* object storage and inserts the
//! analysis record **before** any byte leaves for the provider. If the
//! provider misbehaves afterwards, the submission and its provenance are
//! already durable.
//!
//! - **[`object_store`]** -- [`ObjectStore`] trait with in-memory and
//!   filesystem implementations
//! - **[`record_store`]** -- [`RecordStore`] trait with an in-memory
//!   implementation
//! - **[`failure_log`]** -- [`FailureLog`] for aggregate failure monitoring
//! - **[`recorder`]** -- [`AuditRecorder`], the pre/post-call middleware

pub mod failure_log;
pub mod object_store;
pub mod record_store;
pub mod recorder;

pub use failure_log::{FailureEvent, FailureKindStats, FailureLog, FailureStats, MemoryFailureLog};
pub use object_store::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use record_store::{MemoryRecordStore, RecordStore};
pub use recorder::AuditRecorder;
