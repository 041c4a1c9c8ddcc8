//! The gateway: validate, connect, execute, audit.
//!
//! [`Gateway`] is built once at startup and shared by reference. It owns the
//! policy tables, the router session and the audit sink, and is the only
//! thing the HTTP layer talks to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::audit::{AuditLog, AuditRecord};
use crate::config::Config;
use crate::execution::{CommandRequest, ExecutionEngine, ExecutionResult, ResultKind, NO_EXIT_CODE};
use crate::policy::{PolicyEngine, ValidationVerdict};
use crate::session::{ConnectionState, Connector, SessionManager};
use crate::Result;

/// Command used by [`Gateway::test_connection`]. Not subject to the policy.
pub const CONNECTION_TEST_COMMAND: &str = "echo 'Connection test successful'";

/// Result of one [`Gateway::execute`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Remote command exited with status zero.
    Succeeded {
        stdout: String,
        exit_code: i32,
        duration: Duration,
    },
    /// Remote command ran and exited non-zero.
    RemoteFailed {
        stdout: String,
        stderr: String,
        exit_code: i32,
        duration: Duration,
    },
    /// Malformed request (empty command, zero timeout); nothing was sent.
    Rejected { reason: String },
    /// Rejected by the policy; nothing was sent.
    Denied { reason: String },
    /// No session could be established.
    ConnectionFailed { message: String, duration: Duration },
    /// Deadline elapsed.
    TimedOut { message: String, duration: Duration },
    /// I/O or protocol failure during the remote call.
    TransportFailed { message: String, duration: Duration },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Remote stdout, when the command ran to completion.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Succeeded { stdout, .. } | Self::RemoteFailed { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    /// Error text, `None` on success.
    pub fn error(&self) -> Option<String> {
        match self {
            Self::Succeeded { .. } => None,
            Self::RemoteFailed {
                stderr, exit_code, ..
            } => Some(if stderr.is_empty() {
                format!("exit code {}", exit_code)
            } else {
                stderr.clone()
            }),
            Self::Rejected { reason } | Self::Denied { reason } => Some(reason.clone()),
            Self::ConnectionFailed { message, .. }
            | Self::TimedOut { message, .. }
            | Self::TransportFailed { message, .. } => Some(message.clone()),
        }
    }

    /// Exit code, or [`NO_EXIT_CODE`] when no remote status exists.
    /// `None` when nothing was sent.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Succeeded { exit_code, .. } | Self::RemoteFailed { exit_code, .. } => {
                Some(*exit_code)
            }
            Self::Rejected { .. } | Self::Denied { .. } => None,
            _ => Some(NO_EXIT_CODE),
        }
    }

    /// Wall-clock time spent, `None` when nothing was sent.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Succeeded { duration, .. }
            | Self::RemoteFailed { duration, .. }
            | Self::ConnectionFailed { duration, .. }
            | Self::TimedOut { duration, .. }
            | Self::TransportFailed { duration, .. } => Some(*duration),
            Self::Rejected { .. } | Self::Denied { .. } => None,
        }
    }

    /// Flatten into the wire response.
    pub fn to_response(&self) -> CommandResponse {
        let output = match self {
            Self::Succeeded { stdout, .. } => Some(stdout.clone()),
            Self::RemoteFailed { stdout, .. } if !stdout.is_empty() => Some(stdout.clone()),
            _ => None,
        };
        CommandResponse {
            success: self.is_success(),
            output,
            error: self.error().unwrap_or_default(),
            exit_code: self.exit_code(),
            execution_time: self.duration().map(|d| d.as_secs_f64()),
        }
    }
}

impl From<ExecutionResult> for Outcome {
    fn from(result: ExecutionResult) -> Self {
        let duration = result.duration;
        match result.kind {
            ResultKind::Completed if result.success => Self::Succeeded {
                stdout: result.stdout,
                exit_code: result.exit_code,
                duration,
            },
            ResultKind::Completed => Self::RemoteFailed {
                stdout: result.stdout,
                stderr: result.stderr,
                exit_code: result.exit_code,
                duration,
            },
            ResultKind::TimedOut => Self::TimedOut {
                message: result.stderr,
                duration,
            },
            ResultKind::NotConnected => Self::ConnectionFailed {
                message: result.stderr,
                duration,
            },
            ResultKind::TransportFailed => Self::TransportFailed {
                message: result.stderr,
                duration,
            },
        }
    }
}

/// Wire shape of an execution result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

/// Result of [`Gateway::test_connection`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionTest {
    pub connected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot for status endpoints and startup logging.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub endpoint: String,
    pub state: ConnectionState,
    pub connected: bool,
    pub auth_method: &'static str,
    pub validation_enabled: bool,
    pub audit_enabled: bool,
    pub deny_rules: usize,
    pub allow_rules: usize,
    pub command_timeout_secs: u64,
}

/// Validation, execution and audit for the single router session.
pub struct Gateway {
    policy: PolicyEngine,
    session: Arc<SessionManager>,
    engine: ExecutionEngine,
    audit: Arc<AuditLog>,
    reconnect_attempts: u32,
}

impl Gateway {
    pub fn new(
        policy: PolicyEngine,
        session: Arc<SessionManager>,
        audit: Arc<AuditLog>,
        command_timeout: Duration,
        reconnect_attempts: u32,
    ) -> Self {
        let engine = ExecutionEngine::new(Arc::clone(&session), command_timeout);
        Self {
            policy,
            session,
            engine,
            audit,
            reconnect_attempts,
        }
    }

    /// Build everything from configuration.
    ///
    /// Fails on configuration problems only; no connection is attempted.
    pub fn from_config(config: &Config, connector: Arc<dyn Connector>) -> Result<Self> {
        let target = config.target()?;
        let audit = Arc::new(AuditLog::from_settings(
            config.audit.enabled,
            &config.audit.log_file,
        )?);
        let policy = PolicyEngine::with_extra_rules(
            config.security.validation_enabled,
            &config.security.extra_deny,
            &config.security.extra_allow,
        )?;
        let session = Arc::new(SessionManager::new(target, connector, Arc::clone(&audit)));

        Ok(Self::new(
            policy,
            session,
            audit,
            config.ssh.command_timeout(),
            config.ssh.reconnect_attempts,
        ))
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Dry-run validation. Nothing is audited or sent.
    pub fn validate(&self, command: &str) -> ValidationVerdict {
        self.policy.validate(command)
    }

    /// Execute with the default timeout.
    pub async fn execute(&self, command: &str) -> Outcome {
        self.execute_request(CommandRequest::new(command)).await
    }

    /// Validate, connect if needed, run and audit one command.
    ///
    /// Writes exactly one command record (plus a bypass record when
    /// validation is disabled). A rejected or denied command never touches
    /// the session.
    pub async fn execute_request(&self, request: CommandRequest) -> Outcome {
        let command = request.command.as_str();

        if let Some(reason) = malformed(&request) {
            tracing::warn!(command, reason, "request rejected");
            self.audit.record(AuditRecord::denied(command, reason));
            return Outcome::Rejected {
                reason: reason.to_string(),
            };
        }

        let verdict = self.policy.validate(command);
        if verdict.bypassed {
            self.audit.record(AuditRecord::bypass(command));
        }
        if !verdict.allowed {
            let reason = verdict
                .reason
                .unwrap_or_else(|| crate::policy::NOT_WHITELISTED.to_string());
            self.audit.record(AuditRecord::denied(command, &reason));
            return Outcome::Denied { reason };
        }

        let result = self.run_checked(command, request.timeout).await;
        self.audit.record(AuditRecord::execution(command, &result));
        Outcome::from(result)
    }

    /// Ensure a session and run a trivial echo on it.
    ///
    /// `connected` is true only when the echo completed with status zero; a
    /// session that opens but cannot run a command counts as not connected.
    pub async fn test_connection(&self) -> ConnectionTest {
        let result = self.run_checked(CONNECTION_TEST_COMMAND, None).await;
        self.audit
            .record(AuditRecord::execution(CONNECTION_TEST_COMMAND, &result));

        if result.success {
            ConnectionTest {
                connected: true,
                message: "SSH connection is working".to_string(),
                router_response: Some(result.stdout),
                error: None,
            }
        } else {
            ConnectionTest {
                connected: false,
                message: "SSH connection test failed".to_string(),
                router_response: None,
                error: Some(result.error_message()),
            }
        }
    }

    /// Open the session now instead of on first command.
    pub async fn connect(&self) -> bool {
        self.session.connect().await
    }

    pub fn status(&self) -> GatewayStatus {
        let target = self.session.target();
        let (deny_rules, allow_rules) = self.policy.rule_counts();
        let state = self.session.state();
        GatewayStatus {
            endpoint: target.endpoint(),
            state,
            connected: state.can_execute(),
            auth_method: target.credential.method(),
            validation_enabled: self.policy.is_enabled(),
            audit_enabled: self.audit.is_enabled(),
            deny_rules,
            allow_rules,
            command_timeout_secs: self.engine.default_timeout().as_secs(),
        }
    }

    /// Graceful disconnect. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.session.disconnect().await;
    }

    async fn run_checked(&self, command: &str, timeout: Option<Duration>) -> ExecutionResult {
        let start = Instant::now();
        if let Err(err) = self.connect_with_retry().await {
            return ExecutionResult::not_connected(Some(&err.to_string()), start.elapsed());
        }
        let mut result = self.engine.run(command, timeout).await;
        if result.kind == ResultKind::NotConnected {
            result.duration = start.elapsed();
        }
        result
    }

    async fn connect_with_retry(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.session.ensure_connected().await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.reconnect_attempts => {
                    attempt += 1;
                    tracing::warn!(%err, attempt, "connect failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Requests that can never run, whatever the policy says.
fn malformed(request: &CommandRequest) -> Option<&'static str> {
    if request.command.trim().is_empty() {
        return Some("command must not be empty");
    }
    if request.timeout == Some(Duration::ZERO) {
        return Some("timeout must be positive");
    }
    None
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("session", &self.session)
            .field("validation", &self.policy.is_enabled())
            .field("audit", &self.audit)
            .finish()
    }
}
