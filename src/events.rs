//! Progress notification events and the sink port.
//!
//! The surrounding system renders live progress from these events. The
//! sink is an injected observer rather than a process-wide channel, so the
//! engine carries no hidden global state; a sink that cannot deliver must
//! drop the event rather than fail the run.

use crate::gate::GateRunResult;
use crate::task::TaskStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Named progress event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventName {
    /// A QA attempt started.
    QaRunning,
    /// One gate reached a terminal status.
    GateFinished,
    /// The task's lifecycle status changed.
    StatusChanged,
}

/// One progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Event kind.
    pub name: ProgressEventName,
    /// Task the event belongs to.
    pub task_id: String,
    /// Session the task runs under, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Gate name for per-gate events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_name: Option<String>,
    /// Status payload (gate status or task status, per event kind).
    pub status: String,
    /// Captured output for per-gate events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error lines for failed gates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ProgressEvent {
    /// A QA attempt started for a task.
    pub fn qa_running(task_id: impl Into<String>, attempt: u32) -> Self {
        Self {
            name: ProgressEventName::QaRunning,
            task_id: task_id.into(),
            session_id: None,
            gate_name: None,
            status: format!("qa_running (attempt {attempt})"),
            output: None,
            errors: None,
        }
    }

    /// A gate finished with the given result.
    pub fn gate_finished(task_id: impl Into<String>, result: &GateRunResult) -> Self {
        Self {
            name: ProgressEventName::GateFinished,
            task_id: task_id.into(),
            session_id: None,
            gate_name: Some(result.gate_name.clone()),
            status: result.status.to_string(),
            output: if result.output.is_empty() {
                None
            } else {
                Some(result.output.clone())
            },
            errors: result.error.as_ref().map(|e| vec![e.clone()]),
        }
    }

    /// The task's lifecycle status changed.
    pub fn status_changed(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            name: ProgressEventName::StatusChanged,
            task_id: task_id.into(),
            session_id: None,
            gate_name: None,
            status: status.to_string(),
            output: None,
            errors: None,
        }
    }

    /// Attach a session id.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Injected observer for progress events.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Deliver one event. Must not fail the caller.
    async fn publish(&self, event: ProgressEvent);
}

/// Sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn publish(&self, _event: ProgressEvent) {}
}

/// Sink that records events for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("sink poisoned").clone()
    }

    /// Events of one kind.
    pub fn events_named(&self, name: ProgressEventName) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn publish(&self, event: ProgressEvent) {
        self.events.lock().expect("sink poisoned").push(event);
    }
}
