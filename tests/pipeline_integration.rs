//! End-to-end pipeline tests over the public API.
//!
//! These wire the real sequencer, retry coordinator, and lifecycle
//! controller against the in-memory store with mocked command execution
//! and collaborators, covering the full QA cycle from config resolution
//! to the post-QA status transition.

use gatekeeper::config::{ConfigResolver, GateConfig, RepositoryConfig};
use gatekeeper::events::{ProgressEventName, RecordingSink};
use gatekeeper::gate::{GateExecutor, GateSequencer, GateStatus};
use gatekeeper::retry::RetryCoordinator;
use gatekeeper::sandbox::PathTranslator;
use gatekeeper::store::{ExecutionStore, MemoryStore};
use gatekeeper::task::{Plan, PlanStatus, PlanTask, Task, TaskStatus};
use gatekeeper::testing::{
    write_repository_config, MockCommandRunner, MockCommitBackend, MockPlanResumer, MockReinvoker,
};
use gatekeeper::TaskLifecycleController;
use std::path::Path;
use std::sync::Arc;

struct Pipeline {
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
    commits: Arc<MockCommitBackend>,
    resumer: Arc<MockPlanResumer>,
    reinvoker: Arc<MockReinvoker>,
    controller: TaskLifecycleController,
}

fn pipeline(runner: MockCommandRunner) -> Pipeline {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let commits = Arc::new(MockCommitBackend::new());
    let resumer = Arc::new(MockPlanResumer::new(Arc::clone(&store)));
    let reinvoker = Arc::new(MockReinvoker::new());

    let translator = PathTranslator::new("/nonexistent-host-root", "/sandbox");
    let executor = GateExecutor::new(
        Arc::new(runner),
        Arc::clone(&store) as _,
        translator.clone(),
    );
    let resolver = ConfigResolver::new(translator);
    let sequencer = Arc::new(GateSequencer::new(executor, resolver.clone()));
    let retry = RetryCoordinator::new(
        Arc::clone(&sequencer),
        resolver,
        Arc::clone(&store) as _,
        Arc::clone(&reinvoker) as _,
    );
    let controller = TaskLifecycleController::new(
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        sequencer,
        retry,
        Arc::clone(&sink) as _,
        Arc::clone(&commits) as _,
        Arc::clone(&resumer) as _,
    );

    Pipeline {
        store,
        sink,
        commits,
        resumer,
        reinvoker,
        controller,
    }
}

fn three_gate_config(repo: &Path) {
    write_repository_config(
        repo,
        &RepositoryConfig {
            max_retries: 2,
            qa_gates: vec![
                GateConfig::new("fmt", "run-fmt")
                    .with_order(1)
                    .with_fail_on_error(false),
                GateConfig::new("check", "run-check").with_order(2),
                GateConfig::new("test", "run-test").with_order(3),
            ],
            version: Some(1),
        },
    );
}

#[tokio::test]
async fn full_pass_leaves_audit_trail_and_waits_for_approval() {
    let dir = tempfile::tempdir().unwrap();
    three_gate_config(dir.path());
    let p = pipeline(MockCommandRunner::new().with_success("ok"));
    p.store.insert_task(Task::new("t1", dir.path())).await;

    let report = p.controller.run_task_qa_gates("t1").await.unwrap();
    assert!(report.passed);
    assert_eq!(report.results.len(), 3);
    assert_eq!(
        p.store.task("t1").await.unwrap().status,
        TaskStatus::WaitingApproval
    );

    let records = p.store.executions_for_task("t1").await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == GateStatus::Passed));
    assert!(records.iter().all(|r| r.completed_at.is_some()));
    assert_eq!(
        p.sink.events_named(ProgressEventName::GateFinished).len(),
        3
    );
}

#[tokio::test]
async fn hard_failure_cascades_and_soft_failure_does_not() {
    let dir = tempfile::tempdir().unwrap();
    three_gate_config(dir.path());
    // fmt fails softly (fail_on_error=false), check fails hard, test must
    // never run.
    let runner = MockCommandRunner::new()
        .with_success("")
        .on_command_failure("run-fmt", "style drift", 1)
        .on_command_failure("run-check", "does not compile", 1);
    let handle = runner.handle();
    let p = pipeline(runner);
    p.store.insert_task(Task::new("t1", dir.path())).await;

    let report = p.controller.run_task_qa_gates("t1").await.unwrap();
    assert!(!report.passed);
    let statuses: Vec<GateStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![GateStatus::Failed, GateStatus::Failed, GateStatus::Skipped]
    );
    assert_eq!(handle.commands(), vec!["run-fmt", "run-check"]);
    assert_eq!(
        p.store.task("t1").await.unwrap().status,
        TaskStatus::QaFailed
    );
}

#[tokio::test]
async fn retry_passes_on_second_attempt_with_feedback_in_between() {
    let dir = tempfile::tempdir().unwrap();
    write_repository_config(
        dir.path(),
        &RepositoryConfig {
            max_retries: 3,
            qa_gates: vec![GateConfig::new("test", "run-test").with_order(1)],
            version: None,
        },
    );
    let runner = MockCommandRunner::new().on_command_sequence(
        "run-test",
        vec![
            Err(("expected 4, got 5".to_string(), 101)),
            Ok("all green".to_string()),
        ],
    );
    let p = pipeline(runner);
    p.store.insert_task(Task::new("t1", dir.path())).await;

    let outcome = p
        .controller
        .run_gates_with_retry("t1", dir.path())
        .await
        .unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.attempt, 2);
    assert_eq!(
        p.store.task("t1").await.unwrap().status,
        TaskStatus::WaitingApproval
    );
    assert_eq!(p.store.task("t1").await.unwrap().current_qa_attempt, 2);

    let feedback = p.reinvoker.last_feedback().unwrap();
    assert!(feedback.contains("expected 4, got 5"));

    // Records accumulate across attempts within one retry run.
    let records = p.store.executions_for_task("t1").await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn retry_exhaustion_marks_qa_failed() {
    let dir = tempfile::tempdir().unwrap();
    three_gate_config(dir.path());
    let p = pipeline(MockCommandRunner::new().with_failure("always broken", 1));
    p.store.insert_task(Task::new("t1", dir.path())).await;

    let outcome = p
        .controller
        .run_gates_with_retry("t1", dir.path())
        .await
        .unwrap();
    assert!(!outcome.passed);
    assert_eq!(outcome.attempt, 2);
    assert_eq!(
        p.store.task("t1").await.unwrap().status,
        TaskStatus::QaFailed
    );
    // Feedback only between attempts: max_retries(2) - 1.
    assert_eq!(p.reinvoker.call_count(), 1);
}

#[tokio::test]
async fn plan_linked_pass_commits_completes_and_resumes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    three_gate_config(dir.path());
    let p = pipeline(MockCommandRunner::new().with_success("ok"));
    let mut plan = Plan::new("p1");
    plan.status = PlanStatus::Failed;
    plan.current_task_id = Some("pt1".to_string());
    p.store.insert_plan(plan).await;
    p.store.insert_plan_task(PlanTask::new("pt1", "p1")).await;
    p.store
        .insert_task(
            Task::new("t1", dir.path())
                .with_plan_task("pt1")
                .with_files_changed(vec!["src/lib.rs".into(), "src/gate/mod.rs".into()]),
        )
        .await;

    p.controller.run_task_qa_gates("t1").await.unwrap();

    let task = p.store.task("t1").await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    let sha = task.committed_sha.clone().unwrap();
    assert_eq!(p.store.plan_task("pt1").await.unwrap().commit_sha, Some(sha));
    assert_eq!(p.commits.commit_count(), 1);

    // The plan flipped failed -> running strictly before resume.
    assert_eq!(p.resumer.resumed_ids(), vec!["p1"]);
    assert_eq!(p.resumer.observed_statuses(), vec![PlanStatus::Running]);
}

#[tokio::test]
async fn commit_failure_preserves_the_qa_pass() {
    let dir = tempfile::tempdir().unwrap();
    three_gate_config(dir.path());
    let p = pipeline(MockCommandRunner::new().with_success("ok"));
    p.commits.fail_commits(true);
    p.store.insert_plan(Plan::new("p1")).await;
    p.store.insert_plan_task(PlanTask::new("pt1", "p1")).await;
    p.store
        .insert_task(
            Task::new("t1", dir.path())
                .with_plan_task("pt1")
                .with_files_changed(vec!["src/lib.rs".into()]),
        )
        .await;

    let report = p.controller.run_task_qa_gates("t1").await.unwrap();
    assert!(report.passed);
    let task = p.store.task("t1").await.unwrap();
    assert_eq!(task.status, TaskStatus::WaitingApproval);
    assert_eq!(task.committed_sha, None);
    assert_eq!(p.resumer.resume_count(), 0);
}

#[tokio::test]
async fn resume_failure_does_not_revert_the_completed_task() {
    let dir = tempfile::tempdir().unwrap();
    three_gate_config(dir.path());
    let p = pipeline(MockCommandRunner::new().with_success("ok"));
    p.resumer.fail_with("scheduler offline");
    let mut plan = Plan::new("p1");
    plan.status = PlanStatus::Paused;
    plan.current_task_id = Some("pt1".to_string());
    p.store.insert_plan(plan).await;
    p.store.insert_plan_task(PlanTask::new("pt1", "p1")).await;
    p.store
        .insert_task(Task::new("t1", dir.path()).with_plan_task("pt1"))
        .await;

    p.controller.run_task_qa_gates("t1").await.unwrap();
    assert_eq!(
        p.store.task("t1").await.unwrap().status,
        TaskStatus::Completed
    );
    assert_eq!(p.store.plan("p1").await.unwrap().status, PlanStatus::Running);
    assert_eq!(p.resumer.resume_count(), 1);
}

#[tokio::test]
async fn missing_config_runs_default_gates() {
    let dir = tempfile::tempdir().unwrap();
    // No config file written at all.
    let runner = MockCommandRunner::new().with_success("");
    let handle = runner.handle();
    let p = pipeline(runner);
    p.store.insert_task(Task::new("t1", dir.path())).await;

    let report = p.controller.run_gates_for_task("t1").await.unwrap();
    assert!(report.passed);
    assert_eq!(
        handle.commands(),
        vec!["cargo check --all-targets", "cargo test"]
    );
}

#[tokio::test]
async fn persistence_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    three_gate_config(dir.path());
    let p = pipeline(MockCommandRunner::new().with_success("ok"));
    p.store.insert_task(Task::new("t1", dir.path())).await;
    p.store.set_fail_writes(true);

    let err = p.controller.run_task_qa_gates("t1").await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn config_edits_are_picked_up_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_repository_config(
        dir.path(),
        &RepositoryConfig {
            max_retries: 2,
            qa_gates: vec![GateConfig::new("only", "run-only").with_order(1)],
            version: None,
        },
    );
    let runner = MockCommandRunner::new().with_success("");
    let handle = runner.handle();
    let p = pipeline(runner);
    p.store.insert_task(Task::new("t1", dir.path())).await;

    p.controller.run_gates_for_task("t1").await.unwrap();
    assert_eq!(handle.commands(), vec!["run-only"]);

    // Rewrite the config; the next run must see the new gate list.
    write_repository_config(
        dir.path(),
        &RepositoryConfig {
            max_retries: 2,
            qa_gates: vec![
                GateConfig::new("a", "run-a").with_order(1),
                GateConfig::new("b", "run-b").with_order(2),
            ],
            version: None,
        },
    );
    p.controller.run_gates_for_task("t1").await.unwrap();
    assert_eq!(handle.commands(), vec!["run-only", "run-a", "run-b"]);
}
