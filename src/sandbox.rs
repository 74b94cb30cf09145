//! Host-to-sandbox path translation.
//!
//! Gate commands execute inside a sandbox whose filesystem view of the
//! repository may differ from the host's. The [`PathTranslator`] maps a
//! host path onto the sandbox view by prefix replacement; any path outside
//! the host root passes through untouched, which also makes translation
//! idempotent (an already-translated path no longer carries the host
//! prefix).

use std::path::{Path, PathBuf};

/// Default host-side root under which repositories live.
pub const DEFAULT_HOST_ROOT: &str = "/home/lanath/Work";

/// Default sandbox-side root when none is configured.
pub const DEFAULT_SANDBOX_ROOT: &str = "/workspace";

/// Environment variable overriding the sandbox root.
pub const SANDBOX_ROOT_ENV: &str = "GATEKEEPER_SANDBOX_ROOT";

/// Maps host filesystem paths to their sandbox equivalents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    host_root: PathBuf,
    sandbox_root: PathBuf,
}

impl Default for PathTranslator {
    fn default() -> Self {
        Self {
            host_root: PathBuf::from(DEFAULT_HOST_ROOT),
            sandbox_root: PathBuf::from(DEFAULT_SANDBOX_ROOT),
        }
    }
}

impl PathTranslator {
    /// Create a translator with explicit roots.
    pub fn new(host_root: impl Into<PathBuf>, sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            host_root: host_root.into(),
            sandbox_root: sandbox_root.into(),
        }
    }

    /// Create a translator from the process environment.
    ///
    /// Reads [`SANDBOX_ROOT_ENV`] for the sandbox root; falls back to
    /// [`DEFAULT_SANDBOX_ROOT`]. The host root is always
    /// [`DEFAULT_HOST_ROOT`].
    #[must_use]
    pub fn from_env() -> Self {
        let sandbox_root =
            std::env::var(SANDBOX_ROOT_ENV).unwrap_or_else(|_| DEFAULT_SANDBOX_ROOT.to_string());
        Self::new(DEFAULT_HOST_ROOT, sandbox_root)
    }

    /// The sandbox root this translator maps onto.
    #[must_use]
    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Translate a host path to its sandbox equivalent.
    ///
    /// If `path` is under the host root, the host root prefix is replaced
    /// with the sandbox root; otherwise the path is returned unchanged.
    #[must_use]
    pub fn translate(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.host_root) {
            Ok(rest) => self.sandbox_root.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}
