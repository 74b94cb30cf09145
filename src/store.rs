//! Persistence ports and the in-memory store.
//!
//! The engine never talks to a database directly; it depends on the three
//! ports below. Store failures are infrastructure failures: they propagate
//! and abort the run (audit-trail integrity is prioritized over
//! availability).
//!
//! [`MemoryStore`] implements all three ports over mutex-guarded maps. It
//! backs the CLI's one-shot runs and the test suites.

use crate::error::{GatekeeperError, Result};
use crate::gate::{GateCompletion, GateExecutionRecord};
use crate::task::{Plan, PlanStatus, PlanTask, PlanTaskStatus, Task, TaskStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Port for reading and mutating tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch a task by id.
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>>;

    /// Set a task's lifecycle status.
    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()>;

    /// Set a task's current QA attempt counter.
    async fn set_qa_attempt(&self, task_id: &str, attempt: u32) -> Result<()>;

    /// Record the auto-commit sha and message on a task.
    async fn record_commit(&self, task_id: &str, sha: &str, message: &str) -> Result<()>;
}

/// Port for the per-gate execution audit trail.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a fresh record (must be `Running`).
    async fn create_execution(&self, record: GateExecutionRecord) -> Result<()>;

    /// Write the terminal outcome of a record, exactly once.
    async fn complete_execution(&self, record_id: &str, completion: GateCompletion) -> Result<()>;

    /// Delete all records for a task (fresh run, no stale display).
    async fn delete_executions_for_task(&self, task_id: &str) -> Result<()>;

    /// Fetch all records for a task in creation order.
    async fn executions_for_task(&self, task_id: &str) -> Result<Vec<GateExecutionRecord>>;
}

/// Port for reading and mutating plans and plan steps.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Fetch a plan by id.
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>>;

    /// Fetch a plan step by id.
    async fn get_plan_task(&self, plan_task_id: &str) -> Result<Option<PlanTask>>;

    /// Set a plan's status.
    async fn set_plan_status(&self, plan_id: &str, status: PlanStatus) -> Result<()>;

    /// Mark a plan step completed, with its commit sha when one was made.
    async fn complete_plan_task(
        &self,
        plan_task_id: &str,
        commit_sha: Option<String>,
    ) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    tasks: HashMap<String, Task>,
    // Insertion-ordered so executions_for_task reflects run order.
    executions: Vec<GateExecutionRecord>,
    plans: HashMap<String, Plan>,
    plan_tasks: HashMap<String, PlanTask>,
}

/// In-memory implementation of all three stores.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a store error.
    ///
    /// Used by tests to assert that persistence failures abort the run.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self, operation: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(GatekeeperError::store(operation, "injected write failure"))
        } else {
            Ok(())
        }
    }

    /// Insert a task.
    pub async fn insert_task(&self, task: Task) {
        self.state.lock().await.tasks.insert(task.id.clone(), task);
    }

    /// Insert a plan.
    pub async fn insert_plan(&self, plan: Plan) {
        self.state.lock().await.plans.insert(plan.id.clone(), plan);
    }

    /// Insert a plan step.
    pub async fn insert_plan_task(&self, plan_task: PlanTask) {
        self.state
            .lock()
            .await
            .plan_tasks
            .insert(plan_task.id.clone(), plan_task);
    }

    /// Snapshot a task (test convenience).
    pub async fn task(&self, task_id: &str) -> Option<Task> {
        self.state.lock().await.tasks.get(task_id).cloned()
    }

    /// Snapshot a plan (test convenience).
    pub async fn plan(&self, plan_id: &str) -> Option<Plan> {
        self.state.lock().await.plans.get(plan_id).cloned()
    }

    /// Snapshot a plan step (test convenience).
    pub async fn plan_task(&self, plan_task_id: &str) -> Option<PlanTask> {
        self.state.lock().await.plan_tasks.get(plan_task_id).cloned()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.state.lock().await.tasks.get(task_id).cloned())
    }

    async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.check_writes("set_task_status")?;
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| GatekeeperError::task_not_found(task_id))?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn set_qa_attempt(&self, task_id: &str, attempt: u32) -> Result<()> {
        self.check_writes("set_qa_attempt")?;
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| GatekeeperError::task_not_found(task_id))?;
        task.current_qa_attempt = attempt;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn record_commit(&self, task_id: &str, sha: &str, message: &str) -> Result<()> {
        self.check_writes("record_commit")?;
        let mut state = self.state.lock().await;
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| GatekeeperError::task_not_found(task_id))?;
        task.committed_sha = Some(sha.to_string());
        task.commit_message = Some(message.to_string());
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, record: GateExecutionRecord) -> Result<()> {
        self.check_writes("create_execution")?;
        self.state.lock().await.executions.push(record);
        Ok(())
    }

    async fn complete_execution(&self, record_id: &str, completion: GateCompletion) -> Result<()> {
        self.check_writes("complete_execution")?;
        let mut state = self.state.lock().await;
        let record = state
            .executions
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| GatekeeperError::ExecutionNotFound {
                record_id: record_id.to_string(),
            })?;
        if record.status.is_terminal() {
            return Err(GatekeeperError::store(
                "complete_execution",
                format!("record {record_id} is already terminal"),
            ));
        }
        record.status = completion.status;
        record.output = completion.output;
        record.error = completion.error;
        record.exit_code = completion.exit_code;
        record.duration_ms = completion.duration_ms;
        record.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_executions_for_task(&self, task_id: &str) -> Result<()> {
        self.check_writes("delete_executions_for_task")?;
        self.state
            .lock()
            .await
            .executions
            .retain(|r| r.task_id != task_id);
        Ok(())
    }

    async fn executions_for_task(&self, task_id: &str) -> Result<Vec<GateExecutionRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .executions
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        Ok(self.state.lock().await.plans.get(plan_id).cloned())
    }

    async fn get_plan_task(&self, plan_task_id: &str) -> Result<Option<PlanTask>> {
        Ok(self.state.lock().await.plan_tasks.get(plan_task_id).cloned())
    }

    async fn set_plan_status(&self, plan_id: &str, status: PlanStatus) -> Result<()> {
        self.check_writes("set_plan_status")?;
        let mut state = self.state.lock().await;
        let plan = state
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| GatekeeperError::PlanNotFound {
                plan_id: plan_id.to_string(),
            })?;
        plan.status = status;
        Ok(())
    }

    async fn complete_plan_task(
        &self,
        plan_task_id: &str,
        commit_sha: Option<String>,
    ) -> Result<()> {
        self.check_writes("complete_plan_task")?;
        let mut state = self.state.lock().await;
        let plan_task = state.plan_tasks.get_mut(plan_task_id).ok_or_else(|| {
            GatekeeperError::PlanTaskNotFound {
                plan_task_id: plan_task_id.to_string(),
            }
        })?;
        plan_task.status = PlanTaskStatus::Completed;
        plan_task.commit_sha = commit_sha;
        Ok(())
    }
}
