//! Shell command execution with timeout and structured failure capture.
//!
//! Gate commands run through a shell interpreter with a working directory
//! and a hard timeout. Every failure mode — non-zero exit, timeout, spawn
//! error — is converted into a [`CommandError`] carrying whatever output
//! was captured before the failure, so that one gate's failure can never
//! crash the sequencer above it.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Successful command output.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Structured failure from a command run.
///
/// Never a panic, never a generic error: the exit code is present when the
/// process ran to completion, absent for timeouts and spawn errors.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    /// Human-readable failure description.
    pub message: String,
    /// Standard output captured before the failure.
    pub stdout: String,
    /// Standard error captured before the failure.
    pub stderr: String,
    /// Exit code, if the process exited at all.
    pub exit_code: Option<i32>,
}

impl CommandError {
    /// Create an error with no captured output (spawn-level failure).
    pub fn spawn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
        }
    }

    /// Exit code to record, defaulting to 1 when the process never exited.
    #[must_use]
    pub fn exit_code_or_default(&self) -> i32 {
        self.exit_code.unwrap_or(1)
    }
}

/// Abstraction for running one shell command.
///
/// Enables testing the executor and sequencer without spawning real
/// processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through a shell with the given cwd and timeout.
    ///
    /// Resolves with the captured output on exit code 0.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] for non-zero exit, timeout, or spawn
    /// failure, carrying whatever output was captured.
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;
}

/// Production runner: `sh -c <command>` via tokio with inherited environment.
#[derive(Debug, Clone, Default)]
pub struct ShellCommandRunner;

impl ShellCommandRunner {
    /// Create a new shell runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Drain an output pipe to a string, tolerating invalid UTF-8.
async fn drain(reader: Option<impl AsyncRead + Unpin>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        debug!(command, cwd = %cwd.display(), timeout_ms = timeout.as_millis() as u64, "spawning gate command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::spawn(format!("Failed to spawn command: {e}")))?;

        // Readers run concurrently with the wait so that pipe buffers cannot
        // deadlock a chatty command, and so partial output survives a
        // timeout.
        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                let _ = child.kill().await;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                return Err(CommandError {
                    message: format!("Failed to wait for command: {e}"),
                    stdout,
                    stderr,
                    exit_code: None,
                });
            }
            Err(_) => None,
        };

        match status {
            None => {
                // Timeout: kill the child, then collect what the readers got.
                let _ = child.kill().await;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                Err(CommandError {
                    message: format!("Command timed out after {}ms", timeout.as_millis()),
                    stdout,
                    stderr,
                    exit_code: None,
                })
            }
            Some(status) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                if status.success() {
                    Ok(CommandOutput { stdout, stderr })
                } else {
                    let exit_code = status.code();
                    Err(CommandError {
                        message: match exit_code {
                            Some(code) => format!("Command exited with code {code}"),
                            None => "Command terminated by signal".to_string(),
                        },
                        stdout,
                        stderr,
                        exit_code,
                    })
                }
            }
        }
    }
}
