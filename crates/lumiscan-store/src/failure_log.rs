//! Aggregate failure monitoring.
//!
//! Every pipeline failure is logged twice: a structured `tracing` line
//! with full technical detail, and a [`FailureEvent`] appended here for
//! aggregate statistics (which kinds fire, how many users they hit). This
//! channel is best-effort and never blocks or fails an analysis.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use lumiscan_types::ErrorKind;

/// One recorded pipeline failure.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvent {
    pub user_id: String,
    pub kind: ErrorKind,
    /// Technical detail (raw provider payload or transport error text).
    pub detail: String,
    pub provider_session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FailureEvent {
    pub fn new(
        user_id: impl Into<String>,
        kind: ErrorKind,
        detail: impl Into<String>,
        provider_session_id: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            detail: detail.into(),
            provider_session_id,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated failure counts for one kind.
#[derive(Debug, Clone, Serialize)]
pub struct FailureKindStats {
    pub kind: ErrorKind,
    pub occurrences: usize,
    pub affected_users: usize,
}

/// Aggregated failure statistics.
#[derive(Debug, Clone, Serialize)]
pub struct FailureStats {
    pub total: usize,
    pub by_kind: Vec<FailureKindStats>,
}

/// Sink for pipeline failure events.
#[async_trait]
pub trait FailureLog: Send + Sync {
    /// Record a failure. Must not fail the caller.
    async fn log_failure(&self, event: FailureEvent);

    /// Aggregate statistics over everything recorded so far.
    async fn stats(&self) -> FailureStats;
}

/// In-memory failure log.
#[derive(Default)]
pub struct MemoryFailureLog {
    events: Arc<Mutex<Vec<FailureEvent>>>,
}

impl MemoryFailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first (test helper).
    pub async fn events(&self) -> Vec<FailureEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl FailureLog for MemoryFailureLog {
    async fn log_failure(&self, event: FailureEvent) {
        self.events.lock().await.push(event);
    }

    async fn stats(&self) -> FailureStats {
        let events = self.events.lock().await;
        let mut counts: HashMap<ErrorKind, (usize, HashSet<&str>)> = HashMap::new();
        for event in events.iter() {
            let entry = counts.entry(event.kind).or_default();
            entry.0 += 1;
            entry.1.insert(event.user_id.as_str());
        }
        let mut by_kind: Vec<FailureKindStats> = counts
            .into_iter()
            .map(|(kind, (occurrences, users))| FailureKindStats {
                kind,
                occurrences,
                affected_users: users.len(),
            })
            .collect();
        by_kind.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        FailureStats {
            total: events.len(),
            by_kind,
        }
    }
}
