//! Ordered gate execution with the cascading-skip policy.
//!
//! The sequencer resolves the repository's configuration fresh for every
//! run, filters to enabled gates (already order-sorted by the resolver),
//! and executes them strictly in sequence. Once a gate with
//! `fail_on_error` fails, every remaining gate is recorded as skipped and
//! never executed — including gates whose own `fail_on_error` is false.

use crate::config::ConfigResolver;
use crate::error::Result;
use crate::gate::{GateExecutor, GateRunResult, GateStatus};
use std::path::Path;
use tracing::{info, warn};

/// Runs the enabled gate list for one task.
pub struct GateSequencer {
    executor: GateExecutor,
    resolver: ConfigResolver,
}

impl GateSequencer {
    /// Create a sequencer over an executor and a config resolver.
    pub fn new(executor: GateExecutor, resolver: ConfigResolver) -> Self {
        Self { executor, resolver }
    }

    /// Run every enabled gate in order, applying the cascade policy.
    ///
    /// Returns one result per enabled gate, in execution order.
    ///
    /// # Errors
    ///
    /// Only persistence failures propagate; gate failures are results.
    pub async fn run_all(&self, task_id: &str, repo_path: &Path) -> Result<Vec<GateRunResult>> {
        let config = self.resolver.resolve(repo_path).await;
        let gates = config.enabled_gates();
        info!(task_id, gates = gates.len(), "starting gate run");

        let mut results = Vec::with_capacity(gates.len());
        let mut should_stop = false;

        for gate in gates {
            if should_stop {
                results.push(self.executor.record_skipped(task_id, gate).await?);
                continue;
            }

            let result = self.executor.execute(task_id, gate, repo_path).await?;
            let failed = result.status == GateStatus::Failed;
            results.push(result);

            if failed && gate.fail_on_error {
                warn!(task_id, gate = %gate.name, "blocking gate failed, skipping remaining gates");
                should_stop = true;
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigResolver, GateConfig};
    use crate::gate::all_passed;
    use crate::sandbox::PathTranslator;
    use crate::store::{ExecutionStore, MemoryStore};
    use crate::testing::{write_gate_config, MockCommandRunner};
    use std::sync::Arc;

    fn sequencer(runner: MockCommandRunner, store: Arc<MemoryStore>) -> GateSequencer {
        let translator = PathTranslator::new("/nonexistent-host-root", "/sandbox");
        let executor = GateExecutor::new(Arc::new(runner), store, translator.clone());
        GateSequencer::new(executor, ConfigResolver::new(translator))
    }

    fn gates_abc() -> Vec<GateConfig> {
        vec![
            GateConfig::new("a", "run-a").with_order(1),
            GateConfig::new("b", "run-b").with_order(2),
            GateConfig::new("c", "run-c").with_order(3),
        ]
    }

    #[tokio::test]
    async fn test_gates_execute_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_gate_config(
            dir.path(),
            &[
                GateConfig::new("last", "run-last"),
                GateConfig::new("second", "run-second").with_order(2),
                GateConfig::new("first", "run-first").with_order(1),
            ],
        );
        let store = Arc::new(MemoryStore::new());
        let runner = MockCommandRunner::new().with_success("");
        let handle = runner.handle();
        let seq = sequencer(runner, store);

        let results = seq.run_all("t1", dir.path()).await.unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.gate_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "last"]);
        assert_eq!(handle.commands(), vec!["run-first", "run-second", "run-last"]);
    }

    #[tokio::test]
    async fn test_hard_failure_skips_all_later_gates() {
        let dir = tempfile::tempdir().unwrap();
        write_gate_config(dir.path(), &gates_abc());
        let store = Arc::new(MemoryStore::new());
        let runner = MockCommandRunner::new()
            .with_success("")
            .on_command_failure("run-a", "a blew up", 1);
        let handle = runner.handle();
        let seq = sequencer(runner, Arc::clone(&store));

        let results = seq.run_all("t1", dir.path()).await.unwrap();
        assert_eq!(results[0].status, GateStatus::Failed);
        assert_eq!(results[1].status, GateStatus::Skipped);
        assert_eq!(results[2].status, GateStatus::Skipped);
        assert!(!all_passed(&results));
        // Only the first gate was ever executed.
        assert_eq!(handle.call_count(), 1);

        // Skipped gates still have audit records.
        let records = store.executions_for_task("t1").await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_cascade_poisons_non_blocking_gates_too() {
        let dir = tempfile::tempdir().unwrap();
        write_gate_config(
            dir.path(),
            &[
                GateConfig::new("blocking", "run-blocking").with_order(1),
                GateConfig::new("informational", "run-info")
                    .with_order(2)
                    .with_fail_on_error(false),
            ],
        );
        let store = Arc::new(MemoryStore::new());
        let runner = MockCommandRunner::new()
            .with_success("")
            .on_command_failure("run-blocking", "nope", 1);
        let handle = runner.handle();
        let seq = sequencer(runner, store);

        let results = seq.run_all("t1", dir.path()).await.unwrap();
        assert_eq!(results[1].status, GateStatus::Skipped);
        assert_eq!(handle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_non_blocking_failure_does_not_cascade() {
        let dir = tempfile::tempdir().unwrap();
        write_gate_config(
            dir.path(),
            &[
                GateConfig::new("soft", "run-soft")
                    .with_order(1)
                    .with_fail_on_error(false),
                GateConfig::new("next", "run-next").with_order(2),
            ],
        );
        let store = Arc::new(MemoryStore::new());
        let runner = MockCommandRunner::new()
            .with_success("")
            .on_command_failure("run-soft", "meh", 1);
        let handle = runner.handle();
        let seq = sequencer(runner, store);

        let results = seq.run_all("t1", dir.path()).await.unwrap();
        assert_eq!(results[0].status, GateStatus::Failed);
        assert_eq!(results[1].status, GateStatus::Passed);
        assert_eq!(handle.call_count(), 2);
        assert!(!all_passed(&results));
    }

    #[tokio::test]
    async fn test_disabled_gates_are_not_run_or_recorded() {
        let dir = tempfile::tempdir().unwrap();
        write_gate_config(
            dir.path(),
            &[
                GateConfig::new("on", "run-on").with_order(1),
                GateConfig::new("off", "run-off").with_order(2).with_enabled(false),
            ],
        );
        let store = Arc::new(MemoryStore::new());
        let runner = MockCommandRunner::new().with_success("");
        let seq = sequencer(runner, Arc::clone(&store));

        let results = seq.run_all("t1", dir.path()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(store.executions_for_task("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scenario_a_fails_b_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_gate_config(
            dir.path(),
            &[
                GateConfig::new("A", "run-A").with_order(1),
                GateConfig::new("B", "run-B").with_order(2),
            ],
        );
        let store = Arc::new(MemoryStore::new());
        let runner = MockCommandRunner::new()
            .with_success("")
            .on_command_failure("run-A", "A failed", 1);
        let seq = sequencer(runner, store);

        let results = seq.run_all("t1", dir.path()).await.unwrap();
        assert_eq!(results[0].gate_name, "A");
        assert_eq!(results[0].status, GateStatus::Failed);
        assert_eq!(results[1].gate_name, "B");
        assert_eq!(results[1].status, GateStatus::Skipped);
        assert_eq!(results[1].duration_ms, 0);
        assert!(!all_passed(&results));
    }
}
