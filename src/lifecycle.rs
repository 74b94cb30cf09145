//! Task lifecycle orchestration around a QA run.
//!
//! The [`TaskLifecycleController`] is the top-level entry point: it loads
//! the task, clears stale execution records, runs the gate sequence (or
//! the retry loop), emits progress notifications, and performs the
//! post-QA status transition — including the plan auto-approval branch
//! that commits the change and resumes a blocked plan.
//!
//! The commit and plan-resume collaborators are injected ports, so plan
//! execution can depend on QA without a static dependency cycle.

use crate::error::{GatekeeperError, Result};
use crate::events::{ProgressEvent, ProgressSink};
use crate::gate::{all_passed, GateRunResult, GateSequencer};
use crate::retry::{RetryCoordinator, RetryOutcome};
use crate::store::{ExecutionStore, PlanStore, TaskStore};
use crate::task::{PlanStatus, Task, TaskStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a commit operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// Sha of the created commit.
    pub sha: String,
    /// Message the commit was made with.
    pub message: String,
}

/// External collaborator that writes the auto-approval commit.
#[async_trait]
pub trait CommitBackend: Send + Sync {
    /// Generate a commit message for the task's change.
    ///
    /// # Errors
    ///
    /// Failure falls the task back to manual approval.
    async fn generate_commit_message(&self, task: &Task) -> Result<String>;

    /// Commit the task's changed files with the given message.
    ///
    /// # Errors
    ///
    /// Failure falls the task back to manual approval.
    async fn commit(
        &self,
        repo_path: &Path,
        files_changed: &[String],
        message: &str,
    ) -> Result<CommitOutcome>;
}

/// External entry point into the plan scheduler.
#[async_trait]
pub trait PlanResumer: Send + Sync {
    /// Resume execution of a plan. The plan's status is already `running`
    /// when this is invoked.
    ///
    /// # Errors
    ///
    /// Failure is logged; the completed task is never reverted.
    async fn resume_plan(&self, plan_id: &str) -> Result<()>;
}

/// Report of one QA run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRunReport {
    /// Per-gate results in execution order.
    pub results: Vec<GateRunResult>,
    /// Whether every gate passed or was skipped.
    pub passed: bool,
}

/// Top-level orchestrator for one task's QA cycle.
pub struct TaskLifecycleController {
    tasks: Arc<dyn TaskStore>,
    executions: Arc<dyn ExecutionStore>,
    plans: Arc<dyn PlanStore>,
    sequencer: Arc<GateSequencer>,
    retry: RetryCoordinator,
    sink: Arc<dyn ProgressSink>,
    commits: Arc<dyn CommitBackend>,
    resumer: Arc<dyn PlanResumer>,
}

impl TaskLifecycleController {
    /// Wire a controller from its stores, engine parts, and collaborator
    /// ports.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        executions: Arc<dyn ExecutionStore>,
        plans: Arc<dyn PlanStore>,
        sequencer: Arc<GateSequencer>,
        retry: RetryCoordinator,
        sink: Arc<dyn ProgressSink>,
        commits: Arc<dyn CommitBackend>,
        resumer: Arc<dyn PlanResumer>,
    ) -> Self {
        Self {
            tasks,
            executions,
            plans,
            sequencer,
            retry,
            sink,
            commits,
            resumer,
        }
    }

    async fn load_task(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .get_task(task_id)
            .await?
            .ok_or_else(|| GatekeeperError::task_not_found(task_id))
    }

    /// Prepare a fresh run: clear stale records and announce the attempt.
    async fn begin_run(&self, task: &Task) -> Result<()> {
        self.executions.delete_executions_for_task(&task.id).await?;
        self.tasks
            .set_task_status(&task.id, TaskStatus::QaRunning)
            .await?;
        self.sink
            .publish(ProgressEvent::qa_running(
                &task.id,
                task.current_qa_attempt.max(1),
            ))
            .await;
        Ok(())
    }

    /// Run the gate sequence once for a task and report, with no status
    /// transition beyond marking the run in flight.
    ///
    /// # Errors
    ///
    /// Fails if the task does not exist or a persistence write fails.
    pub async fn run_gates_for_task(&self, task_id: &str) -> Result<QaRunReport> {
        let task = self.load_task(task_id).await?;
        self.begin_run(&task).await?;

        let results = self.sequencer.run_all(task_id, &task.repo_path).await?;
        for result in &results {
            self.sink
                .publish(ProgressEvent::gate_finished(task_id, result))
                .await;
        }
        let passed = all_passed(&results);
        Ok(QaRunReport { results, passed })
    }

    /// Run the bounded retry loop for a task.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures from any attempt.
    pub async fn run_gates_with_retry(
        &self,
        task_id: &str,
        repo_path: &Path,
    ) -> Result<RetryOutcome> {
        self.retry.run_with_retry(task_id, repo_path).await
    }

    /// Full QA lifecycle for a task: single gate pass, notifications, and
    /// the post-QA status transition with its side effects.
    ///
    /// # Errors
    ///
    /// Fails before any mutation if the task does not exist; otherwise
    /// only persistence failures propagate.
    pub async fn run_task_qa_gates(&self, task_id: &str) -> Result<QaRunReport> {
        let task = self.load_task(task_id).await?;
        self.begin_run(&task).await?;

        let results = self.sequencer.run_all(task_id, &task.repo_path).await?;
        for result in &results {
            self.sink
                .publish(ProgressEvent::gate_finished(task_id, result))
                .await;
        }
        let passed = all_passed(&results);

        if !passed {
            self.transition(task_id, TaskStatus::QaFailed).await?;
            return Ok(QaRunReport { results, passed });
        }

        match &task.plan_task_id {
            None => {
                self.transition(task_id, TaskStatus::WaitingApproval).await?;
            }
            Some(plan_task_id) => {
                self.auto_approve(&task, plan_task_id).await?;
            }
        }
        Ok(QaRunReport { results, passed })
    }

    async fn transition(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.tasks.set_task_status(task_id, status).await?;
        self.sink
            .publish(ProgressEvent::status_changed(task_id, status))
            .await;
        info!(task_id, %status, "task status changed");
        Ok(())
    }

    /// Auto-approval branch for plan-linked tasks after a QA pass.
    async fn auto_approve(&self, task: &Task, plan_task_id: &str) -> Result<()> {
        if task.files_changed.is_empty() {
            // Nothing to commit: complete directly.
            self.transition(&task.id, TaskStatus::Completed).await?;
            self.plans.complete_plan_task(plan_task_id, None).await?;
            self.resume_if_blocked(plan_task_id).await?;
            return Ok(());
        }

        match self.auto_commit(task).await {
            Ok(outcome) => {
                self.tasks
                    .record_commit(&task.id, &outcome.sha, &outcome.message)
                    .await?;
                self.transition(&task.id, TaskStatus::Completed).await?;
                self.plans
                    .complete_plan_task(plan_task_id, Some(outcome.sha))
                    .await?;
                self.resume_if_blocked(plan_task_id).await?;
            }
            Err(e) => {
                // A good QA pass must not be lost to a commit hiccup:
                // fall back to manual approval.
                warn!(task_id = %task.id, error = %e, "auto-commit failed, falling back to manual approval");
                self.transition(&task.id, TaskStatus::WaitingApproval).await?;
            }
        }
        Ok(())
    }

    async fn auto_commit(&self, task: &Task) -> Result<CommitOutcome> {
        let message = self.commits.generate_commit_message(task).await?;
        self.commits
            .commit(&task.repo_path, &task.files_changed, &message)
            .await
    }

    /// If the owning plan is stalled on this step, flip it to `running`
    /// and hand control back to the scheduler.
    ///
    /// The status flip happens strictly before the resume call so the
    /// scheduler observes `running`, never a stale paused/failed state.
    async fn resume_if_blocked(&self, plan_task_id: &str) -> Result<()> {
        let plan_task = self
            .plans
            .get_plan_task(plan_task_id)
            .await?
            .ok_or_else(|| GatekeeperError::PlanTaskNotFound {
                plan_task_id: plan_task_id.to_string(),
            })?;
        let plan = self
            .plans
            .get_plan(&plan_task.plan_id)
            .await?
            .ok_or_else(|| GatekeeperError::PlanNotFound {
                plan_id: plan_task.plan_id.clone(),
            })?;

        if plan.is_stalled() && plan.is_blocked_on(plan_task_id) {
            self.plans
                .set_plan_status(&plan.id, PlanStatus::Running)
                .await?;
            info!(plan_id = %plan.id, plan_task_id, "resuming plan");
            if let Err(e) = self.resumer.resume_plan(&plan.id).await {
                warn!(plan_id = %plan.id, error = %e, "plan resume failed; task remains completed");
            }
        }
        Ok(())
    }
}
