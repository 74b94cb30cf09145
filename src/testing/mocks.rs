//! Mock implementations of the engine's ports.
//!
//! These mocks provide controllable test doubles for external
//! dependencies, enabling deterministic unit tests. They count calls and
//! record arguments so tests can assert *what* was executed, not just the
//! final state.

use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::error::{GatekeeperError, Result};
use crate::lifecycle::{CommitBackend, CommitOutcome, PlanResumer};
use crate::retry::TaskReinvoker;
use crate::store::MemoryStore;
use crate::task::{PlanStatus, Task};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// MockCommandRunner
// ============================================================================

#[derive(Debug, Clone)]
enum MockOutcome {
    Success(String),
    Failure { stderr: String, exit_code: i32 },
    SpawnError(String),
}

impl MockOutcome {
    fn into_result(self) -> std::result::Result<CommandOutput, CommandError> {
        match self {
            Self::Success(stdout) => Ok(CommandOutput {
                stdout,
                stderr: String::new(),
            }),
            Self::Failure { stderr, exit_code } => Err(CommandError {
                message: format!("Command exited with code {exit_code}"),
                stdout: String::new(),
                stderr,
                exit_code: Some(exit_code),
            }),
            Self::SpawnError(message) => Err(CommandError::spawn(message)),
        }
    }
}

struct Script {
    outcomes: Vec<MockOutcome>,
    next: AtomicUsize,
}

impl Script {
    fn advance(&self) -> MockOutcome {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        self.outcomes[i.min(self.outcomes.len() - 1)].clone()
    }
}

#[derive(Default)]
struct RunnerState {
    default: Mutex<Option<MockOutcome>>,
    scripted: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

/// Mock command runner with per-command scripting.
///
/// # Example
///
/// ```rust,ignore
/// let runner = MockCommandRunner::new()
///     .with_success("")
///     .on_command_failure("cargo test", "2 tests failed", 101);
/// let handle = runner.handle();
/// // ... run the sequencer ...
/// assert_eq!(handle.call_count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct MockCommandRunner {
    state: Arc<RunnerState>,
}

/// Inspection handle onto a [`MockCommandRunner`]'s recorded calls.
#[derive(Clone)]
pub struct MockRunnerHandle {
    state: Arc<RunnerState>,
}

impl MockCommandRunner {
    /// Create a runner whose default outcome is success with no output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default every unscripted command to success with this stdout.
    #[must_use]
    pub fn with_success(self, stdout: &str) -> Self {
        *self.state.default.lock().expect("mock poisoned") =
            Some(MockOutcome::Success(stdout.to_string()));
        self
    }

    /// Default every unscripted command to failure.
    #[must_use]
    pub fn with_failure(self, stderr: &str, exit_code: i32) -> Self {
        *self.state.default.lock().expect("mock poisoned") = Some(MockOutcome::Failure {
            stderr: stderr.to_string(),
            exit_code,
        });
        self
    }

    /// Default every unscripted command to a spawn-level error.
    #[must_use]
    pub fn with_spawn_error(self, message: &str) -> Self {
        *self.state.default.lock().expect("mock poisoned") =
            Some(MockOutcome::SpawnError(message.to_string()));
        self
    }

    /// Script one command to succeed with this stdout.
    #[must_use]
    pub fn on_command_success(self, command: &str, stdout: &str) -> Self {
        self.script(command, vec![MockOutcome::Success(stdout.to_string())])
    }

    /// Script one command to fail.
    #[must_use]
    pub fn on_command_failure(self, command: &str, stderr: &str, exit_code: i32) -> Self {
        self.script(
            command,
            vec![MockOutcome::Failure {
                stderr: stderr.to_string(),
                exit_code,
            }],
        )
    }

    /// Script a sequence of outcomes for one command; the last outcome
    /// repeats once exhausted. `Ok(stdout)` succeeds, `Err((stderr,
    /// exit_code))` fails.
    #[must_use]
    pub fn on_command_sequence(
        self,
        command: &str,
        outcomes: Vec<std::result::Result<String, (String, i32)>>,
    ) -> Self {
        let outcomes = outcomes
            .into_iter()
            .map(|o| match o {
                Ok(stdout) => MockOutcome::Success(stdout),
                Err((stderr, exit_code)) => MockOutcome::Failure { stderr, exit_code },
            })
            .collect();
        self.script(command, outcomes)
    }

    fn script(self, command: &str, outcomes: Vec<MockOutcome>) -> Self {
        assert!(!outcomes.is_empty(), "script needs at least one outcome");
        self.state.scripted.lock().expect("mock poisoned").insert(
            command.to_string(),
            Script {
                outcomes,
                next: AtomicUsize::new(0),
            },
        );
        self
    }

    /// Inspection handle that survives handing the runner to the engine.
    #[must_use]
    pub fn handle(&self) -> MockRunnerHandle {
        MockRunnerHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockRunnerHandle {
    /// Number of commands actually executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().expect("mock poisoned").len()
    }

    /// Commands executed, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .expect("mock poisoned")
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    /// Working directories used, in order.
    #[must_use]
    pub fn cwds(&self) -> Vec<PathBuf> {
        self.state
            .calls
            .lock()
            .expect("mock poisoned")
            .iter()
            .map(|(_, cwd)| cwd.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        _timeout: Duration,
    ) -> std::result::Result<CommandOutput, CommandError> {
        self.state
            .calls
            .lock()
            .expect("mock poisoned")
            .push((command.to_string(), cwd.to_path_buf()));

        let scripted = self
            .state
            .scripted
            .lock()
            .expect("mock poisoned")
            .get(command)
            .map(Script::advance);
        let outcome = scripted.unwrap_or_else(|| {
            self.state
                .default
                .lock()
                .expect("mock poisoned")
                .clone()
                .unwrap_or(MockOutcome::Success(String::new()))
        });
        outcome.into_result()
    }
}

// ============================================================================
// MockCommitBackend
// ============================================================================

/// Mock commit collaborator.
///
/// Succeeds by default with a deterministic sha; can be flipped to fail
/// either phase.
#[derive(Default)]
pub struct MockCommitBackend {
    fail_message: AtomicBool,
    fail_commit: AtomicBool,
    commit_count: AtomicU32,
    message_count: AtomicU32,
}

impl MockCommitBackend {
    /// Create a backend that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make commit-message generation fail.
    pub fn fail_messages(&self, fail: bool) {
        self.fail_message.store(fail, Ordering::SeqCst);
    }

    /// Make the commit operation fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Number of commits attempted.
    #[must_use]
    pub fn commit_count(&self) -> u32 {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// Number of messages generated.
    #[must_use]
    pub fn message_count(&self) -> u32 {
        self.message_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitBackend for MockCommitBackend {
    async fn generate_commit_message(&self, task: &Task) -> Result<String> {
        self.message_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_message.load(Ordering::SeqCst) {
            return Err(GatekeeperError::commit("message generation unavailable"));
        }
        Ok(format!("Apply changes for task {}", task.id))
    }

    async fn commit(
        &self,
        _repo_path: &Path,
        _files_changed: &[String],
        message: &str,
    ) -> Result<CommitOutcome> {
        let n = self.commit_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(GatekeeperError::commit("git commit failed"));
        }
        Ok(CommitOutcome {
            sha: format!("sha-{n:07}"),
            message: message.to_string(),
        })
    }
}

// ============================================================================
// MockPlanResumer
// ============================================================================

/// Mock plan-resume collaborator.
///
/// Records the plan status *as observed at the moment of the resume call*,
/// which lets tests assert the flip-to-running-before-resume ordering.
pub struct MockPlanResumer {
    store: Arc<MemoryStore>,
    resumed: Mutex<Vec<(String, Option<PlanStatus>)>>,
    error: Mutex<Option<String>>,
}

impl MockPlanResumer {
    /// Create a resumer observing plans through the given store.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            resumed: Mutex::new(Vec::new()),
            error: Mutex::new(None),
        }
    }

    /// Make resume calls fail with this message.
    pub fn fail_with(&self, message: &str) {
        *self.error.lock().expect("mock poisoned") = Some(message.to_string());
    }

    /// Number of resume calls.
    #[must_use]
    pub fn resume_count(&self) -> usize {
        self.resumed.lock().expect("mock poisoned").len()
    }

    /// Plan ids resumed, in order.
    #[must_use]
    pub fn resumed_ids(&self) -> Vec<String> {
        self.resumed
            .lock()
            .expect("mock poisoned")
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Plan statuses observed at each resume call.
    #[must_use]
    pub fn observed_statuses(&self) -> Vec<PlanStatus> {
        self.resumed
            .lock()
            .expect("mock poisoned")
            .iter()
            .filter_map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl PlanResumer for MockPlanResumer {
    async fn resume_plan(&self, plan_id: &str) -> Result<()> {
        let status = self.store.plan(plan_id).await.map(|p| p.status);
        self.resumed
            .lock()
            .expect("mock poisoned")
            .push((plan_id.to_string(), status));
        if let Some(message) = self.error.lock().expect("mock poisoned").clone() {
            return Err(GatekeeperError::PlanResume {
                plan_id: plan_id.to_string(),
                message,
            });
        }
        Ok(())
    }
}

// ============================================================================
// MockReinvoker
// ============================================================================

/// Mock reinvocation channel for retry feedback.
#[derive(Default)]
pub struct MockReinvoker {
    calls: Mutex<Vec<(String, String)>>,
    error: Mutex<Option<String>>,
}

impl MockReinvoker {
    /// Create a reinvoker that accepts feedback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reinvocation fail with this message.
    #[must_use]
    pub fn with_error(self, message: &str) -> Self {
        *self.error.lock().expect("mock poisoned") = Some(message.to_string());
        self
    }

    /// Number of reinvocations delivered (or attempted).
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock poisoned").len()
    }

    /// Feedback from the most recent reinvocation.
    #[must_use]
    pub fn last_feedback(&self) -> Option<String> {
        self.calls
            .lock()
            .expect("mock poisoned")
            .last()
            .map(|(_, feedback)| feedback.clone())
    }
}

#[async_trait]
impl TaskReinvoker for MockReinvoker {
    async fn reinvoke(&self, task_id: &str, feedback: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("mock poisoned")
            .push((task_id.to_string(), feedback.to_string()));
        if let Some(message) = self.error.lock().expect("mock poisoned").clone() {
            return Err(GatekeeperError::Reinvoke {
                task_id: task_id.to_string(),
                message,
            });
        }
        Ok(())
    }
}
