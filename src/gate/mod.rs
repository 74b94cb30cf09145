//! Gate execution: records, results, executor, sequencer.
//!
//! A *gate* is one named shell command with a timeout, run against a
//! repository. A *run* is one pass through the enabled gate list for a
//! task, producing exactly one [`GateExecutionRecord`] per gate.

pub mod executor;
pub mod sequencer;

pub use executor::GateExecutor;
pub use sequencer::GateSequencer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output recorded for gates skipped by the cascade policy.
pub const SKIPPED_OUTPUT: &str = "Skipped due to previous gate failure";

/// Status of one gate execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// Gate has started (or is about to be resolved as skipped).
    Running,
    /// Command exited 0.
    Passed,
    /// Command failed, timed out, or could not be spawned.
    Failed,
    /// Not executed because an earlier blocking gate failed.
    Skipped,
}

impl GateStatus {
    /// Whether this status counts toward an overall pass.
    #[must_use]
    pub fn is_passing(&self) -> bool {
        matches!(self, Self::Passed | Self::Skipped)
    }

    /// Whether this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Persisted audit record of one gate execution within one run.
///
/// Created with `status = Running` the moment a gate begins (or is
/// determined to be skipped), then updated exactly once to a terminal
/// status. The two-phase write guarantees an audit trail exists even if
/// the command itself later fails unexpectedly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateExecutionRecord {
    /// Unique record id.
    pub id: String,
    /// Task (run) this record belongs to.
    pub task_id: String,
    /// Gate name.
    pub gate_name: String,
    /// Command that was (or would have been) run.
    pub command: String,
    /// Current status.
    pub status: GateStatus,
    /// Captured stdout, or the skip marker.
    pub output: String,
    /// Captured stderr / failure message.
    pub error: Option<String>,
    /// Exit code of the command, when it exited.
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// When the record reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl GateExecutionRecord {
    /// Create a fresh running record for a gate.
    pub fn begin(
        task_id: impl Into<String>,
        gate_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            gate_name: gate_name.into(),
            command: command.into(),
            status: GateStatus::Running,
            output: String::new(),
            error: None,
            exit_code: None,
            duration_ms: 0,
            completed_at: None,
        }
    }
}

/// Terminal outcome written to a record in its second phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCompletion {
    /// Terminal status (never `Running`).
    pub status: GateStatus,
    /// Captured stdout, or the skip marker.
    pub output: String,
    /// Captured stderr / failure message.
    pub error: Option<String>,
    /// Exit code, defaulted to 1 for failures without one.
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl GateCompletion {
    /// A passing completion.
    pub fn passed(output: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        let error = error.into();
        Self {
            status: GateStatus::Passed,
            output: output.into(),
            error: if error.is_empty() { None } else { Some(error) },
            exit_code: Some(0),
            duration_ms,
        }
    }

    /// A failing completion.
    pub fn failed(
        output: impl Into<String>,
        error: impl Into<String>,
        exit_code: i32,
        duration_ms: u64,
    ) -> Self {
        Self {
            status: GateStatus::Failed,
            output: output.into(),
            error: Some(error.into()),
            exit_code: Some(exit_code),
            duration_ms,
        }
    }

    /// A skipped completion (cascade policy).
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            status: GateStatus::Skipped,
            output: SKIPPED_OUTPUT.to_string(),
            error: None,
            exit_code: None,
            duration_ms: 0,
        }
    }
}

/// In-memory result of one gate within one run, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRunResult {
    /// Id of the persisted execution record.
    pub record_id: String,
    /// Gate name.
    pub gate_name: String,
    /// Terminal status.
    pub status: GateStatus,
    /// Captured stdout, or the skip marker.
    pub output: String,
    /// Captured stderr / failure message.
    pub error: Option<String>,
    /// Exit code, when the command exited.
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl GateRunResult {
    /// Short one-line summary for logs and the CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.status {
            GateStatus::Passed => format!("✅ {}: passed ({}ms)", self.gate_name, self.duration_ms),
            GateStatus::Failed => format!(
                "❌ {}: failed (exit {}, {}ms)",
                self.gate_name,
                self.exit_code.unwrap_or(1),
                self.duration_ms
            ),
            GateStatus::Skipped => format!("⏭️  {}: skipped", self.gate_name),
            GateStatus::Running => format!("… {}: running", self.gate_name),
        }
    }
}

/// Whether a run passed: every result passed or was skipped.
#[must_use]
pub fn all_passed(results: &[GateRunResult]) -> bool {
    results.iter().all(|r| r.status.is_passing())
}
