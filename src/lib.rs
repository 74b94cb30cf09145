//! Gatekeeper - quality-gate execution and task lifecycle orchestration.
//!
//! Given a task that has produced a code change, Gatekeeper runs the
//! repository's configured validation gates in order, applies a
//! cascading-skip policy on hard failure, retries the whole cycle with
//! accumulated feedback, and drives the task's lifecycle to a terminal or
//! human-actionable state — auto-committing and resuming a blocked plan
//! for plan-linked tasks.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`sandbox`] - Host-to-sandbox path translation
//! - [`command`] - Shell command execution with timeout and structured failure
//! - [`config`] - Gate configuration loading with a default fallback
//! - [`task`] - Task and plan data model
//! - [`store`] - Persistence ports and the in-memory store
//! - [`events`] - Progress notification events and sink port
//! - [`gate`] - Gate executor, sequencer, and execution records
//! - [`retry`] - Bounded QA retry loop with feedback
//! - [`lifecycle`] - Top-level task lifecycle controller
//! - [`testing`] - Testing infrastructure (mocks, fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use gatekeeper::command::ShellCommandRunner;
//! use gatekeeper::config::ConfigResolver;
//! use gatekeeper::gate::{GateExecutor, GateSequencer};
//! use gatekeeper::sandbox::PathTranslator;
//! use gatekeeper::store::MemoryStore;
//! use std::sync::Arc;
//!
//! let translator = PathTranslator::from_env();
//! let store = Arc::new(MemoryStore::new());
//! let executor = GateExecutor::new(
//!     Arc::new(ShellCommandRunner::new()),
//!     store,
//!     translator.clone(),
//! );
//! let sequencer = GateSequencer::new(executor, ConfigResolver::new(translator));
//! let results = sequencer.run_all("task-1", repo_path).await?;
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod lifecycle;
pub mod retry;
pub mod sandbox;
pub mod store;
pub mod task;
pub mod testing;

// Re-export commonly used types
pub use error::{GatekeeperError, Result};

// Re-export command execution types
pub use command::{CommandError, CommandOutput, CommandRunner, ShellCommandRunner};

// Re-export config types
pub use config::{
    ConfigResolver, GateConfig, RepositoryConfig, CONFIG_FILE, DEFAULT_GATE_TIMEOUT_MS,
    DEFAULT_MAX_RETRIES,
};

// Re-export data model types
pub use task::{Plan, PlanStatus, PlanTask, PlanTaskStatus, Task, TaskStatus};

// Re-export gate types
pub use gate::{
    all_passed, GateCompletion, GateExecutionRecord, GateExecutor, GateRunResult, GateSequencer,
    GateStatus,
};

// Re-export orchestration types
pub use lifecycle::{
    CommitBackend, CommitOutcome, PlanResumer, QaRunReport, TaskLifecycleController,
};
pub use retry::{assemble_feedback, RetryCoordinator, RetryOutcome, TaskReinvoker};

// Re-export ports and infrastructure
pub use events::{NullSink, ProgressEvent, ProgressEventName, ProgressSink, RecordingSink};
pub use sandbox::PathTranslator;
pub use store::{ExecutionStore, MemoryStore, PlanStore, TaskStore};
