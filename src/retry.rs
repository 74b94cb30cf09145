//! Bounded QA retry loop.
//!
//! Each attempt re-runs the *entire* gate sequence (never a filtered
//! subset), and between attempts the failed gates' output is assembled
//! into feedback for the external reinvocation channel, so the agent that
//! produced the change can fix it before the next attempt.

use crate::config::ConfigResolver;
use crate::error::Result;
use crate::gate::{all_passed, GateRunResult, GateSequencer, GateStatus};
use crate::store::TaskStore;
use crate::task::TaskStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Final outcome of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOutcome {
    /// Whether the final attempt passed.
    pub passed: bool,
    /// The attempt number the loop stopped at (1-indexed).
    pub attempt: u32,
}

/// Side channel that hands QA feedback back to the code-producing agent.
#[async_trait]
pub trait TaskReinvoker: Send + Sync {
    /// Deliver feedback for a task before the next attempt.
    ///
    /// # Errors
    ///
    /// May fail; the retry loop logs and proceeds to the next attempt
    /// regardless.
    async fn reinvoke(&self, task_id: &str, feedback: &str) -> Result<()>;
}

/// Assemble feedback text from the failed gates of one attempt.
#[must_use]
pub fn assemble_feedback(attempt: u32, results: &[GateRunResult]) -> String {
    let mut feedback = format!(
        "QA attempt {attempt} failed. Fix the issues below; the full gate sequence will re-run.\n"
    );
    for result in results.iter().filter(|r| r.status == GateStatus::Failed) {
        feedback.push_str(&format!(
            "\n### Gate `{}` failed (exit {})\n",
            result.gate_name,
            result.exit_code.unwrap_or(1)
        ));
        if let Some(error) = &result.error {
            if !error.is_empty() {
                feedback.push_str(error);
                feedback.push('\n');
            }
        }
        if !result.output.is_empty() {
            feedback.push_str(&result.output);
            feedback.push('\n');
        }
    }
    feedback
}

/// Wraps the sequencer in a bounded attempt loop.
pub struct RetryCoordinator {
    sequencer: Arc<GateSequencer>,
    resolver: ConfigResolver,
    tasks: Arc<dyn TaskStore>,
    reinvoker: Arc<dyn TaskReinvoker>,
}

impl RetryCoordinator {
    /// Create a coordinator over the sequencer and its collaborators.
    pub fn new(
        sequencer: Arc<GateSequencer>,
        resolver: ConfigResolver,
        tasks: Arc<dyn TaskStore>,
        reinvoker: Arc<dyn TaskReinvoker>,
    ) -> Self {
        Self {
            sequencer,
            resolver,
            tasks,
            reinvoker,
        }
    }

    /// Run the full QA cycle for a task, retrying up to the configured
    /// budget.
    ///
    /// Stops at the first passing attempt (`waiting_approval`) or when
    /// attempts are exhausted (`qa_failed`).
    ///
    /// # Errors
    ///
    /// Propagates persistence failures; gate failures are handled by the
    /// loop.
    pub async fn run_with_retry(&self, task_id: &str, repo_path: &Path) -> Result<RetryOutcome> {
        let config = self.resolver.resolve(repo_path).await;
        let max_retries = config.max_retries.max(1);

        let mut attempt = 1;
        loop {
            self.tasks
                .set_task_status(task_id, TaskStatus::QaRunning)
                .await?;
            self.tasks.set_qa_attempt(task_id, attempt).await?;
            info!(task_id, attempt, max_retries, "starting QA attempt");

            let results = self.sequencer.run_all(task_id, repo_path).await?;

            if all_passed(&results) {
                self.tasks
                    .set_task_status(task_id, TaskStatus::WaitingApproval)
                    .await?;
                info!(task_id, attempt, "QA passed");
                return Ok(RetryOutcome {
                    passed: true,
                    attempt,
                });
            }

            if attempt == max_retries {
                self.tasks
                    .set_task_status(task_id, TaskStatus::QaFailed)
                    .await?;
                warn!(task_id, attempt, "QA attempts exhausted");
                return Ok(RetryOutcome {
                    passed: false,
                    attempt,
                });
            }

            let feedback = assemble_feedback(attempt, &results);
            if let Err(e) = self.reinvoker.reinvoke(task_id, &feedback).await {
                warn!(task_id, attempt, error = %e, "reinvocation channel failed");
            }
            attempt += 1;
        }
    }
}
