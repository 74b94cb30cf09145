//! Test fixtures for repository gate configuration.
//!
//! Config-file helpers write real `.gatekeeper/qa.json` files into a
//! temporary repository directory so tests exercise the actual resolver
//! path, not a shortcut around it.

use crate::config::{GateConfig, RepositoryConfig, CONFIG_FILE};
use std::path::Path;

/// Write a full repository config file under `repo`.
///
/// # Panics
///
/// Panics on IO failure; fixtures are test-only.
pub fn write_repository_config(repo: &Path, config: &RepositoryConfig) {
    let path = repo.join(CONFIG_FILE);
    std::fs::create_dir_all(path.parent().expect("config file has a parent"))
        .expect("create config dir");
    let body = serde_json::to_string_pretty(config).expect("serialize config");
    std::fs::write(path, body).expect("write config file");
}

/// Write a config file with the given gates and default retry budget.
pub fn write_gate_config(repo: &Path, gates: &[GateConfig]) {
    write_repository_config(
        repo,
        &RepositoryConfig {
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            qa_gates: gates.to_vec(),
            version: Some(1),
        },
    );
}
