//! Execution result types.

use std::time::Duration;

use crate::error::GatewayError;
use crate::session::RemoteOutput;

/// Exit code meaning "no remote exit code available".
pub const NO_EXIT_CODE: i32 = -1;

/// What happened to a remote invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// The remote process ran and reported an exit status.
    Completed,
    /// The deadline elapsed first.
    TimedOut,
    /// There was no live session.
    NotConnected,
    /// I/O or protocol failure.
    TransportFailed,
}

/// Normalized outcome of one remote command.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Remote exit status was zero.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Real exit code, or [`NO_EXIT_CODE`].
    pub exit_code: i32,
    /// Wall-clock time, measured for every outcome.
    pub duration: Duration,
    pub kind: ResultKind,
}

impl ExecutionResult {
    /// Result from a remote invocation that ran to completion.
    pub fn completed(output: RemoteOutput, duration: Duration) -> Self {
        match output.exit_status {
            Some(status) => {
                let exit_code = i32::try_from(status).unwrap_or(i32::MAX);
                Self {
                    success: exit_code == 0,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    exit_code,
                    duration,
                    kind: ResultKind::Completed,
                }
            }
            None => {
                let stderr = if output.stderr.is_empty() {
                    "Command execution error: channel closed without exit status".to_string()
                } else {
                    output.stderr
                };
                Self {
                    success: false,
                    stdout: output.stdout,
                    stderr,
                    exit_code: NO_EXIT_CODE,
                    duration,
                    kind: ResultKind::TransportFailed,
                }
            }
        }
    }

    /// Synthetic result for an invocation abandoned at its deadline.
    pub fn timeout(timeout: Duration, duration: Duration) -> Self {
        Self::synthetic(
            GatewayError::Timeout(timeout).to_string(),
            duration,
            ResultKind::TimedOut,
        )
    }

    /// Synthetic result when there is no live session.
    pub fn not_connected(detail: Option<&str>, duration: Duration) -> Self {
        let message = match detail {
            Some(detail) => format!("No active SSH connection: {}", detail),
            None => "No active SSH connection. Call connect() first.".to_string(),
        };
        Self::synthetic(message, duration, ResultKind::NotConnected)
    }

    /// Synthetic result for a transport failure.
    pub fn transport_failure(error: &GatewayError, duration: Duration) -> Self {
        Self::synthetic(
            format!("Command execution error: {}", error),
            duration,
            ResultKind::TransportFailed,
        )
    }

    fn synthetic(stderr: String, duration: Duration, kind: ResultKind) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr,
            exit_code: NO_EXIT_CODE,
            duration,
            kind,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Error text for a failed result.
    ///
    /// Falls back to the exit code when the remote wrote nothing to stderr.
    pub fn error_message(&self) -> String {
        if !self.stderr.is_empty() {
            self.stderr.clone()
        } else if self.success {
            String::new()
        } else {
            format!("exit code {}", self.exit_code)
        }
    }
}
