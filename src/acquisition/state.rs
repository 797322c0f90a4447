//! # Acquisition State
//!
//! Lifecycle states of the acquisition loop and the summary of a finished session.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Loop lifecycle: `Idle → Running → {Stopped | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Idle,
    Running,
    /// Ended by an explicit stop request
    Stopped,
    /// Ended by a read, parse or write fault
    Failed,
}

impl LoopState {
    /// `Stopped` and `Failed` end a session for good
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Stopped | LoopState::Failed)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
            LoopState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot the loop publishes after every change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopStatus {
    pub state: LoopState,
    /// Rows persisted so far
    pub records: u64,
}

impl LoopStatus {
    pub const IDLE: LoopStatus = LoopStatus { state: LoopState::Idle, records: 0 };

    pub(crate) fn running(records: u64) -> Self {
        Self { state: LoopState::Running, records }
    }
}

/// Outcome of one collection session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub label: String,
    /// Completed CSV file
    pub path: PathBuf,
    pub started_at: DateTime<Local>,
    pub field_count: usize,
    pub records: u64,
    pub elapsed_seconds: f64,
    pub state: LoopState,
    /// Why the session failed, if it did
    pub failure: Option<String>,
}

impl SessionSummary {
    pub fn failed(&self) -> bool {
        self.state == LoopState::Failed
    }
}
