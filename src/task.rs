//! Task and plan data model.
//!
//! A [`Task`] is one unit of automated work that has produced a code
//! change and is the unit of QA retry. A task may optionally be linked to
//! a step of a [`Plan`]; plan-linked tasks are auto-approved (and
//! auto-committed) on QA pass instead of waiting for a human.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle states of a task, as driven by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Code change is being produced; QA has not started.
    InProgress,
    /// QA gates are running for the current attempt.
    QaRunning,
    /// QA attempts exhausted without a pass.
    QaFailed,
    /// QA passed; waiting for human approval.
    WaitingApproval,
    /// QA passed and the task was auto-approved (plan-linked).
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::QaRunning => "qa_running",
            Self::QaFailed => "qa_failed",
            Self::WaitingApproval => "waiting_approval",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// One unit of automated work with a produced code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id.
    pub id: String,
    /// Host path of the repository the change was made in.
    pub repo_path: PathBuf,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Current QA attempt number (1-indexed, 0 before the first run).
    pub current_qa_attempt: u32,
    /// Files the change touched.
    pub files_changed: Vec<String>,
    /// Unified diff of the change, when available.
    pub diff_content: Option<String>,
    /// Sha of the auto-commit, once made.
    pub committed_sha: Option<String>,
    /// Message of the auto-commit, once made.
    pub commit_message: Option<String>,
    /// Plan step this task belongs to, if any.
    pub plan_task_id: Option<String>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task ready for QA.
    pub fn new(id: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            repo_path: repo_path.into(),
            status: TaskStatus::InProgress,
            current_qa_attempt: 0,
            files_changed: Vec::new(),
            diff_content: None,
            committed_sha: None,
            commit_message: None,
            plan_task_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Set the changed file list.
    #[must_use]
    pub fn with_files_changed(mut self, files: Vec<String>) -> Self {
        self.files_changed = files;
        self
    }

    /// Set the diff content.
    #[must_use]
    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff_content = Some(diff.into());
        self
    }

    /// Link the task to a plan step.
    #[must_use]
    pub fn with_plan_task(mut self, plan_task_id: impl Into<String>) -> Self {
        self.plan_task_id = Some(plan_task_id.into());
        self
    }

    /// Whether this task is a step of a plan.
    #[must_use]
    pub fn is_plan_linked(&self) -> bool {
        self.plan_task_id.is_some()
    }
}

/// Lifecycle states of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Plan is actively executing steps.
    Running,
    /// Plan is paused, blocked on its current step.
    Paused,
    /// Plan stopped because its current step failed.
    Failed,
    /// All steps done.
    Completed,
}

/// Status of one plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTaskStatus {
    /// Step not yet started.
    Pending,
    /// Step currently being worked.
    Running,
    /// Step finished successfully.
    Completed,
    /// Step failed.
    Failed,
}

/// An ordered multi-step plan; the unit that gets resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan id.
    pub id: String,
    /// Current plan state.
    pub status: PlanStatus,
    /// Plan-task id of the step the plan is currently on (or blocked on).
    pub current_task_id: Option<String>,
}

impl Plan {
    /// Create a running plan.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: PlanStatus::Running,
            current_task_id: None,
        }
    }

    /// Whether the plan is stalled (paused or failed).
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        matches!(self.status, PlanStatus::Paused | PlanStatus::Failed)
    }

    /// Whether the plan is blocked on the given step.
    #[must_use]
    pub fn is_blocked_on(&self, plan_task_id: &str) -> bool {
        self.current_task_id.as_deref() == Some(plan_task_id)
    }
}

/// One step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    /// Unique plan-task id.
    pub id: String,
    /// Owning plan.
    pub plan_id: String,
    /// Step state.
    pub status: PlanTaskStatus,
    /// Commit sha produced by the step, once committed.
    pub commit_sha: Option<String>,
}

impl PlanTask {
    /// Create a running plan step.
    pub fn new(id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plan_id: plan_id.into(),
            status: PlanTaskStatus::Running,
            commit_sha: None,
        }
    }
}
