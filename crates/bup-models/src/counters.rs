//! Per-run upload counters.

use serde::{Deserialize, Serialize};

/// Upload counters scoped to one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every attempted upload succeeded
    Succeeded,
    /// Some uploads succeeded, some failed
    PartiallySucceeded,
    /// Uploads were attempted and none succeeded
    Failed,
    /// No asset matched any route
    NothingToUpload,
    /// Configuration was rejected before any I/O
    Rejected,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self) {
        self.attempted += 1;
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Uploads dispatched but not yet settled.
    pub fn pending(&self) -> u64 {
        self.attempted.saturating_sub(self.succeeded + self.failed)
    }

    /// Classify the run from the settled counters.
    pub fn status(&self) -> RunStatus {
        match (self.attempted, self.succeeded) {
            (0, _) => RunStatus::NothingToUpload,
            (_, 0) => RunStatus::Failed,
            (a, s) if s == a => RunStatus::Succeeded,
            _ => RunStatus::PartiallySucceeded,
        }
    }
}

impl RunStatus {
    /// Whether the run should be reported as a failure to the caller.
    pub fn is_failure(&self) -> bool {
        matches!(self, RunStatus::Failed | RunStatus::Rejected)
    }
}
