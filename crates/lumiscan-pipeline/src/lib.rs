//! End-to-end orchestration of the skin-analysis acquisition pipeline.
//!
//! [`AnalysisPipeline::analyze`] is the single entry point external
//! callers use. It drives the state machine
//!
//! ```text
//! Received -> Validated -> SlotReserved -> Uploaded -> Polling
//!                                              -> Completed | Failed
//! ```
//!
//! strictly in order: entry validation (no network), the write-before-call
//! persistence hook, the three provider phases, and the closing
//! persistence hook. Every phase failure becomes a classified error on
//! the durable record; downstream consumers read results back through
//! [`AnalysisPipeline::get_analysis`] / [`AnalysisPipeline::list_analyses`]
//! and never touch the provider client directly.

pub mod orchestrator;
pub mod validate;

pub use orchestrator::{AnalysisOutcome, AnalysisPipeline};
pub use validate::{ImageDims, validate_image};
