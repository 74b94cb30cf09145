//! Custom error types for Gatekeeper.
//!
//! This module provides structured error types that enable better
//! error handling, reporting, and recovery throughout the pipeline.
//!
//! The central distinction: a gate *failing* is never an error (it is a
//! structured result), while infrastructure problems (a missing task, a
//! persistence write failing) are errors and abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Gatekeeper operations
#[derive(Error, Debug)]
pub enum GatekeeperError {
    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Task does not exist in the store
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// Plan task does not exist in the store
    #[error("Plan task not found: {plan_task_id}")]
    PlanTaskNotFound { plan_task_id: String },

    /// Plan does not exist in the store
    #[error("Plan not found: {plan_id}")]
    PlanNotFound { plan_id: String },

    /// Gate execution record does not exist
    #[error("Gate execution record not found: {record_id}")]
    ExecutionNotFound { record_id: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Persistence operation failed (fatal: audit-trail integrity over availability)
    #[error("Store error during {operation}: {message}")]
    Store { operation: String, message: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid gate configuration value
    #[error("Invalid gate config: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Configuration file could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Auto-commit collaborator failed (recovered by falling back to manual approval)
    #[error("Commit operation failed: {message}")]
    Commit { message: String },

    /// Plan resume collaborator failed
    #[error("Plan resume failed for {plan_id}: {message}")]
    PlanResume { plan_id: String, message: String },

    /// Task reinvocation channel failed
    #[error("Reinvocation failed for task {task_id}: {message}")]
    Reinvoke { task_id: String, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatekeeperError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a task-not-found error
    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    /// Create a store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid-config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a commit error
    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error is recoverable without aborting the run.
    ///
    /// Commit failures fall back to manual approval; config problems fall
    /// back to the default configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Commit { .. } | Self::Config { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Check if this error is fatal (aborts the run before or mid-flight)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound { .. }
                | Self::PlanTaskNotFound { .. }
                | Self::PlanNotFound { .. }
                | Self::ExecutionNotFound { .. }
                | Self::Store { .. }
        )
    }
}

/// Type alias for Gatekeeper results
pub type Result<T> = std::result::Result<T, GatekeeperError>;
