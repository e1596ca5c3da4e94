//! Protocol client for the remote skin-analysis provider.
//!
//! The provider protocol has three phases, driven strictly in order by the
//! pipeline orchestrator:
//!
//! 1. [`VisionClient::reserve_upload_slot`] -- obtain a time-limited upload
//!    destination plus the session id that correlates the eventual result
//! 2. [`VisionClient::upload_image`] -- `PUT` the raw image bytes to the
//!    reserved destination
//! 3. [`VisionClient::poll_analysis`] -- poll for the finished analysis at
//!    a fixed interval, normalizing scores on success
//!
//! Every failure is returned as a
//! [`ClassifiedError`](lumiscan_types::ClassifiedError) -- this crate never
//! panics on provider misbehavior and applies no retries beyond the
//! bounded poll loop (whole-call retry policy belongs to the caller).

pub mod client;
pub mod scores;
pub mod types;

pub use client::VisionClient;
pub use scores::normalize_scores;
pub use types::{AnalysisData, AnalysisEnvelope, AnalysisSuccess, ConcernScore, UploadSlot};
