//! Execution of exactly one gate.
//!
//! The executor owns the two-phase audit write around a command run:
//! create the record as `running`, invoke the command through the path
//! translator, then complete the record with the terminal outcome. A
//! gate's own failure never raises — only a store failure does.

use crate::command::CommandRunner;
use crate::config::GateConfig;
use crate::error::Result;
use crate::gate::{GateCompletion, GateExecutionRecord, GateRunResult, GateStatus, SKIPPED_OUTPUT};
use crate::sandbox::PathTranslator;
use crate::store::ExecutionStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Executes one gate and records its outcome.
pub struct GateExecutor {
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn ExecutionStore>,
    translator: PathTranslator,
}

impl GateExecutor {
    /// Create an executor over the given runner, store, and translator.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn ExecutionStore>,
        translator: PathTranslator,
    ) -> Self {
        Self {
            runner,
            store,
            translator,
        }
    }

    /// Run one gate against a repository.
    ///
    /// Returns the terminal result whether the gate passed or failed.
    ///
    /// # Errors
    ///
    /// Only persistence failures propagate; command failures become a
    /// `Failed` result.
    pub async fn execute(
        &self,
        task_id: &str,
        gate: &GateConfig,
        repo_path: &Path,
    ) -> Result<GateRunResult> {
        let cwd = self.translator.translate(repo_path);
        let record = GateExecutionRecord::begin(task_id, &gate.name, &gate.command);
        let record_id = record.id.clone();
        self.store.create_execution(record).await?;

        debug!(task_id, gate = %gate.name, cwd = %cwd.display(), "gate starting");
        let start = Instant::now();
        let outcome = self.runner.run(&gate.command, &cwd, gate.timeout()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let completion = match &outcome {
            Ok(output) => GateCompletion::passed(&output.stdout, &output.stderr, duration_ms),
            Err(e) => {
                let error = if e.stderr.is_empty() {
                    e.message.clone()
                } else {
                    e.stderr.clone()
                };
                GateCompletion::failed(&e.stdout, error, e.exit_code_or_default(), duration_ms)
            }
        };
        let result = GateRunResult {
            record_id: record_id.clone(),
            gate_name: gate.name.clone(),
            status: completion.status,
            output: completion.output.clone(),
            error: completion.error.clone(),
            exit_code: completion.exit_code,
            duration_ms,
        };
        self.store.complete_execution(&record_id, completion).await?;

        info!(task_id, gate = %gate.name, status = %result.status, duration_ms, "gate finished");
        Ok(result)
    }

    /// Record a gate as skipped without executing it.
    ///
    /// Skipped gates get the same two-phase audit trail as executed ones.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub async fn record_skipped(&self, task_id: &str, gate: &GateConfig) -> Result<GateRunResult> {
        let record = GateExecutionRecord::begin(task_id, &gate.name, &gate.command);
        let record_id = record.id.clone();
        self.store.create_execution(record).await?;
        self.store
            .complete_execution(&record_id, GateCompletion::skipped())
            .await?;

        info!(task_id, gate = %gate.name, "gate skipped");
        Ok(GateRunResult {
            record_id,
            gate_name: gate.name.clone(),
            status: GateStatus::Skipped,
            output: SKIPPED_OUTPUT.to_string(),
            error: None,
            exit_code: None,
            duration_ms: 0,
        })
    }
}
