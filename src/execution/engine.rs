//! Remote command execution with a deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::result::ExecutionResult;
use crate::session::SessionManager;

/// Default execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs single commands on the shared session.
///
/// Never fails: every outcome, including timeouts and transport errors, is
/// normalized into an [`ExecutionResult`].
pub struct ExecutionEngine {
    session: Arc<SessionManager>,
    default_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(session: Arc<SessionManager>, default_timeout: Duration) -> Self {
        Self {
            session,
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `command` with `timeout` (or the default).
    ///
    /// Requires a live session; without one, returns a not-connected result
    /// and sends nothing. A timeout closes only this invocation's channel;
    /// the shared session stays open.
    pub async fn run(&self, command: &str, timeout: Option<Duration>) -> ExecutionResult {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();

        let Some(shell) = self.session.current() else {
            tracing::warn!(command, "no active SSH connection");
            return ExecutionResult::not_connected(None, start.elapsed());
        };

        tracing::debug!(command, timeout_secs = timeout.as_secs(), "executing command");

        let deadline = tokio::time::Instant::now() + timeout;
        let result = match tokio::time::timeout_at(deadline, shell.spawn(command)).await {
            Ok(Ok(mut process)) => match tokio::time::timeout_at(deadline, process.wait()).await {
                Ok(Ok(output)) => ExecutionResult::completed(output, start.elapsed()),
                Ok(Err(err)) => ExecutionResult::transport_failure(&err, start.elapsed()),
                Err(_) => {
                    process.abort().await;
                    ExecutionResult::timeout(timeout, start.elapsed())
                }
            },
            Ok(Err(err)) => ExecutionResult::transport_failure(&err, start.elapsed()),
            Err(_) => ExecutionResult::timeout(timeout, start.elapsed()),
        };

        if result.success {
            tracing::debug!(command, secs = result.duration_secs(), "command succeeded");
        } else {
            tracing::warn!(
                command,
                exit_code = result.exit_code,
                kind = ?result.kind,
                error = %result.stderr,
                "command failed"
            );
        }

        result
    }
}
