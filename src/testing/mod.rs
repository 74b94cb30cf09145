//! Testing infrastructure: controllable doubles and fixtures.
//!
//! These are public so integration tests (and downstream consumers
//! embedding the engine) can exercise the pipeline without real
//! subprocesses, repositories, or schedulers.

pub mod fixtures;
pub mod mocks;

pub use fixtures::{write_gate_config, write_repository_config};
pub use mocks::{
    MockCommandRunner, MockCommitBackend, MockPlanResumer, MockReinvoker, MockRunnerHandle,
};
