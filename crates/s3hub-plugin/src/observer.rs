//! Per-plugin outcome reporting.
//!
//! Plugin failures are swallowed by the dispatcher so that one broken
//! plugin cannot block the others. Each invocation still produces a
//! [`PluginOutcome`], which is traced and handed to an optional
//! [`OutcomeObserver`].

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use s3hub_core::types::S3Operation;

/// How a single plugin invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// `execute` returned a result.
    Succeeded,
    /// `execute` returned an error.
    Failed(String),
    /// The plugin's deadline elapsed first.
    TimedOut,
    /// The caller cancelled the operation first.
    Cancelled,
    /// The plugin's gate declined the call.
    Skipped,
}

impl OutcomeStatus {
    /// Returns whether the invocation produced a result.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Record of one plugin invocation within a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct PluginOutcome {
    /// Plugin name.
    pub plugin: String,
    /// Operation being dispatched.
    pub operation: S3Operation,
    /// Request identifier of the call.
    pub request_id: Uuid,
    /// How the invocation ended.
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Wall time spent in the invocation.
    pub elapsed: Duration,
}

/// Receives every plugin outcome.
///
/// Called inline on the dispatch path; implementations must not block.
pub trait OutcomeObserver: Send + Sync + fmt::Debug {
    /// Handles one outcome.
    fn on_outcome(&self, outcome: &PluginOutcome);
}

/// Observer that keeps outcomes in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    outcomes: Mutex<Vec<PluginOutcome>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn outcomes(&self) -> Vec<PluginOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns the recorded outcomes for one plugin.
    pub fn outcomes_for(&self, plugin: &str) -> Vec<PluginOutcome> {
        self.outcomes()
            .into_iter()
            .filter(|o| o.plugin == plugin)
            .collect()
    }
}

impl OutcomeObserver for RecordingObserver {
    fn on_outcome(&self, outcome: &PluginOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outcome.clone());
    }
}
