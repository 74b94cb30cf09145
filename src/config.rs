//! Gate configuration loading and resolution.
//!
//! Each repository declares its QA gates in `.gatekeeper/qa.json` at the
//! repository root. The [`ConfigResolver`] is total-failure-proof: a
//! missing file, malformed JSON, invalid gate definitions, or a slow
//! filesystem all fall back to the hard-coded default configuration, so a
//! broken config can never block validation entirely.
//!
//! Configuration is resolved fresh on every run so edits are picked up
//! immediately; nothing here is cached.

use crate::error::{GatekeeperError, Result};
use crate::sandbox::PathTranslator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Config file path relative to the repository root.
pub const CONFIG_FILE: &str = ".gatekeeper/qa.json";

/// Default per-gate timeout in milliseconds.
pub const DEFAULT_GATE_TIMEOUT_MS: u64 = 60_000;

/// Default retry budget for the QA cycle.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Bound on how long a config file load may take before falling back.
pub const CONFIG_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_GATE_TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// One named validation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Gate name, unique within a configuration.
    pub name: String,
    /// Shell command to run.
    pub command: String,
    /// Timeout for the command in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether the gate runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether a failure of this gate poisons the rest of the run.
    #[serde(default = "default_true")]
    pub fail_on_error: bool,
    /// Sort position; gates without an order run after all ordered gates.
    #[serde(default)]
    pub order: Option<u32>,
}

impl GateConfig {
    /// Create a gate with defaults for everything but name and command.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            timeout_ms: DEFAULT_GATE_TIMEOUT_MS,
            enabled: true,
            fail_on_error: true,
            order: None,
        }
    }

    /// Set the sort position.
    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Set the timeout in milliseconds.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Enable or disable the gate.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set whether a failure blocks subsequent gates.
    #[must_use]
    pub fn with_fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    /// Timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-repository QA configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Maximum QA attempts per task.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Gates to run, in `order` sequence.
    #[serde(default)]
    pub qa_gates: Vec<GateConfig>,
    /// Config schema version.
    #[serde(default)]
    pub version: Option<u32>,
}

impl Default for RepositoryConfig {
    /// The hard-coded fallback: check then test.
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            qa_gates: vec![
                GateConfig::new("check", "cargo check --all-targets")
                    .with_order(1)
                    .with_timeout_ms(300_000),
                GateConfig::new("test", "cargo test")
                    .with_order(2)
                    .with_timeout_ms(600_000),
            ],
            version: None,
        }
    }
}

impl RepositoryConfig {
    /// Sort gates ascending by `order`, gates without an order last.
    ///
    /// The sort is stable, so ties and unordered gates keep their file
    /// order.
    pub fn sort_gates(&mut self) {
        self.qa_gates
            .sort_by_key(|g| g.order.map_or((1u8, 0u32), |o| (0u8, o)));
    }

    /// Validate gate definitions: non-empty unique names, non-empty commands.
    ///
    /// # Errors
    ///
    /// Returns [`GatekeeperError::InvalidConfig`] describing the first
    /// violation.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for gate in &self.qa_gates {
            if gate.name.trim().is_empty() {
                return Err(GatekeeperError::invalid_config("name", "gate name is empty"));
            }
            if gate.command.trim().is_empty() {
                return Err(GatekeeperError::invalid_config(
                    "command",
                    format!("gate '{}' has an empty command", gate.name),
                ));
            }
            if !seen.insert(gate.name.clone()) {
                return Err(GatekeeperError::invalid_config(
                    "name",
                    format!("duplicate gate name '{}'", gate.name),
                ));
            }
        }
        Ok(())
    }

    /// Enabled gates in execution order.
    #[must_use]
    pub fn enabled_gates(&self) -> Vec<&GateConfig> {
        self.qa_gates.iter().filter(|g| g.enabled).collect()
    }
}

/// Resolves a repository's gate configuration, never failing the caller.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    translator: PathTranslator,
    load_timeout: Duration,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(PathTranslator::default())
    }
}

impl ConfigResolver {
    /// Create a resolver with the given path translator.
    #[must_use]
    pub fn new(translator: PathTranslator) -> Self {
        Self {
            translator,
            load_timeout: CONFIG_LOAD_TIMEOUT,
        }
    }

    /// Override the load timeout (mainly for tests).
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Absolute (translated) path of the config file for a repository.
    #[must_use]
    pub fn config_path(&self, repo_path: &Path) -> PathBuf {
        self.translator.translate(repo_path).join(CONFIG_FILE)
    }

    /// Resolve the configuration for a repository.
    ///
    /// Always returns a usable configuration: load or parse problems are
    /// logged and replaced by [`RepositoryConfig::default`]. Gates in a
    /// successfully loaded config come back sorted by `order`.
    pub async fn resolve(&self, repo_path: &Path) -> RepositoryConfig {
        let path = self.config_path(repo_path);
        match self.try_load(&path).await {
            Ok(mut config) => {
                config.sort_gates();
                debug!(
                    path = %path.display(),
                    gates = config.qa_gates.len(),
                    max_retries = config.max_retries,
                    "resolved repository gate config"
                );
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "falling back to default gate config");
                let mut config = RepositoryConfig::default();
                config.sort_gates();
                config
            }
        }
    }

    async fn try_load(&self, path: &Path) -> Result<RepositoryConfig> {
        let read = tokio::time::timeout(self.load_timeout, tokio::fs::read_to_string(path));
        let raw = match read.await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                return Err(GatekeeperError::config_with_path(
                    format!("failed to read config: {e}"),
                    path.to_path_buf(),
                ))
            }
            Err(_) => {
                return Err(GatekeeperError::config_with_path(
                    format!("config load timed out after {:?}", self.load_timeout),
                    path.to_path_buf(),
                ))
            }
        };
        let config: RepositoryConfig = serde_json::from_str(&raw).map_err(|e| {
            GatekeeperError::config_with_path(
                format!("failed to parse config: {e}"),
                path.to_path_buf(),
            )
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_for(dir: &Path) -> ConfigResolver {
        // Identity translation: host root that no test path starts with.
        let _ = dir;
        ConfigResolver::new(PathTranslator::new("/nonexistent-host-root", "/sandbox"))
    }

    fn write_config(dir: &Path, body: &str) {
        let config_dir = dir.join(".gatekeeper");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("qa.json"), body).unwrap();
    }

    #[test]
    fn test_default_config_has_ordered_gates() {
        let config = RepositoryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.qa_gates.len(), 2);
        assert_eq!(config.qa_gates[0].name, "check");
        assert_eq!(config.qa_gates[1].name, "test");
    }

    #[test]
    fn test_sort_gates_orders_ascending_none_last() {
        let mut config = RepositoryConfig {
            max_retries: 3,
            qa_gates: vec![
                GateConfig::new("unordered", "true"),
                GateConfig::new("second", "true").with_order(2),
                GateConfig::new("first", "true").with_order(1),
            ],
            version: None,
        };
        config.sort_gates();
        let names: Vec<&str> = config.qa_gates.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "unordered"]);
    }

    #[test]
    fn test_sort_is_stable_for_unordered_gates() {
        let mut config = RepositoryConfig {
            max_retries: 3,
            qa_gates: vec![
                GateConfig::new("a", "true"),
                GateConfig::new("b", "true"),
                GateConfig::new("ordered", "true").with_order(5),
            ],
            version: None,
        };
        config.sort_gates();
        let names: Vec<&str> = config.qa_gates.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["ordered", "a", "b"]);
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let config = RepositoryConfig {
            max_retries: 3,
            qa_gates: vec![
                GateConfig::new("lint", "true"),
                GateConfig::new("lint", "false"),
            ],
            version: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        let config = RepositoryConfig {
            max_retries: 3,
            qa_gates: vec![GateConfig::new("lint", "  ")],
            version: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_gates_filters_disabled() {
        let config = RepositoryConfig {
            max_retries: 3,
            qa_gates: vec![
                GateConfig::new("on", "true"),
                GateConfig::new("off", "true").with_enabled(false),
            ],
            version: None,
        };
        let enabled: Vec<&str> = config.enabled_gates().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(enabled, vec!["on"]);
    }

    #[tokio::test]
    async fn test_resolve_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_for(dir.path());
        let config = resolver.resolve(dir.path()).await;
        assert_eq!(config.qa_gates.len(), 2);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_resolve_malformed_json_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "{ not json");
        let resolver = resolver_for(dir.path());
        let config = resolver.resolve(dir.path()).await;
        assert_eq!(config.qa_gates[0].name, "check");
    }

    #[tokio::test]
    async fn test_resolve_invalid_gates_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"{"qaGates": [{"name": "", "command": "true"}]}"#,
        );
        let resolver = resolver_for(dir.path());
        let config = resolver.resolve(dir.path()).await;
        assert_eq!(config.qa_gates[0].name, "check");
    }

    #[tokio::test]
    async fn test_resolve_loads_and_sorts_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"{
                "maxRetries": 5,
                "qaGates": [
                    {"name": "late", "command": "true"},
                    {"name": "second", "command": "true", "order": 2, "failOnError": false},
                    {"name": "first", "command": "true", "order": 1, "timeoutMs": 1000}
                ],
                "version": 1
            }"#,
        );
        let resolver = resolver_for(dir.path());
        let config = resolver.resolve(dir.path()).await;
        assert_eq!(config.max_retries, 5);
        let names: Vec<&str> = config.qa_gates.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "late"]);
        assert_eq!(config.qa_gates[0].timeout_ms, 1000);
        assert!(!config.qa_gates[1].fail_on_error);
        assert!(config.qa_gates[2].enabled);
    }

    #[tokio::test]
    async fn test_resolve_applies_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"{"qaGates": [{"name": "lint", "command": "cargo clippy"}]}"#,
        );
        let resolver = resolver_for(dir.path());
        let config = resolver.resolve(dir.path()).await;
        let gate = &config.qa_gates[0];
        assert!(gate.enabled);
        assert!(gate.fail_on_error);
        assert_eq!(gate.timeout_ms, DEFAULT_GATE_TIMEOUT_MS);
        assert_eq!(gate.order, None);
    }

    #[tokio::test]
    async fn test_config_path_is_translated() {
        let resolver = ConfigResolver::new(PathTranslator::new("/home/lanath/Work", "/workspace"));
        let path = resolver.config_path(Path::new("/home/lanath/Work/repo"));
        assert_eq!(path, PathBuf::from("/workspace/repo/.gatekeeper/qa.json"));
    }
}
