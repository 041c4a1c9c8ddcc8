//! Audit record types and line formatting.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::execution::ExecutionResult;

/// Maximum characters of command output kept in a record.
pub const OUTPUT_EXCERPT_LIMIT: usize = 200;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Category of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Command,
    Connect,
    Disconnect,
    Error,
    /// Command forwarded with validation disabled.
    Bypass,
}

/// Severity column of the audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One append-only audit entry.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub timestamp: DateTime<Local>,
    pub kind: AuditKind,
    pub level: AuditLevel,
    /// Everything after the level column.
    pub payload: String,
}

impl AuditRecord {
    fn new(kind: AuditKind, level: AuditLevel, payload: String) -> Self {
        Self {
            timestamp: Local::now(),
            kind,
            level,
            payload,
        }
    }

    /// Record a command outcome.
    ///
    /// Carries either the error message or an output excerpt, never both.
    pub fn command(
        command: &str,
        success: bool,
        duration: Duration,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Self {
        let status = if success { "SUCCESS" } else { "FAILED" };
        let mut payload = format!(
            "COMMAND: {} | STATUS: {} | TIME: {:.2}s",
            escape_line(command),
            status,
            duration.as_secs_f64()
        );

        match (error, output) {
            (Some(error), _) => {
                payload.push_str(" | ERROR: ");
                payload.push_str(&escape_line(error));
            }
            (None, Some(output)) if !output.is_empty() => {
                payload.push_str(" | OUTPUT: ");
                payload.push_str(&excerpt(output));
            }
            _ => {}
        }

        let level = if success {
            AuditLevel::Info
        } else {
            AuditLevel::Warning
        };
        Self::new(AuditKind::Command, level, payload)
    }

    /// Record the outcome of a remote execution.
    pub fn execution(command: &str, result: &ExecutionResult) -> Self {
        if result.success {
            Self::command(command, true, result.duration, Some(&result.stdout), None)
        } else {
            let error = result.error_message();
            Self::command(command, false, result.duration, None, Some(&error))
        }
    }

    /// Record a policy denial. No remote interaction happened.
    pub fn denied(command: &str, reason: &str) -> Self {
        Self::command(command, false, Duration::ZERO, None, Some(reason))
    }

    /// Record that a command skipped validation.
    pub fn bypass(command: &str) -> Self {
        Self::new(
            AuditKind::Bypass,
            AuditLevel::Warning,
            format!(
                "POLICY BYPASS | validation disabled for command: {}",
                escape_line(command)
            ),
        )
    }

    pub fn connect(endpoint: &str) -> Self {
        Self::connection(AuditKind::Connect, AuditLevel::Info, "CONNECT", endpoint)
    }

    pub fn disconnect(details: &str) -> Self {
        Self::connection(AuditKind::Disconnect, AuditLevel::Info, "DISCONNECT", details)
    }

    pub fn connection_error(details: &str) -> Self {
        Self::connection(AuditKind::Error, AuditLevel::Error, "ERROR", details)
    }

    fn connection(kind: AuditKind, level: AuditLevel, event: &str, details: &str) -> Self {
        Self::new(kind, level, format!("SSH {} | {}", event, escape_line(details)))
    }

    /// Render as a single line without the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{} | {} | {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.payload
        )
    }
}

/// Truncate to [`OUTPUT_EXCERPT_LIMIT`] characters and flatten newlines.
pub fn excerpt(output: &str) -> String {
    let mut text: String = output.chars().take(OUTPUT_EXCERPT_LIMIT).collect();
    if output.chars().nth(OUTPUT_EXCERPT_LIMIT).is_some() {
        text.push_str("...");
    }
    text.replace(&['\r', '\n'][..], " ")
}

// Keeps caller-controlled text from starting a forged record on a new line.
fn escape_line(text: &str) -> String {
    text.replace('\r', "\\r").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_success_line() {
        let record = AuditRecord::command(
            "uptime",
            true,
            Duration::from_millis(1500),
            Some("up 3 days"),
            None,
        );
        let line = record.to_line();
        assert!(line.contains(" | INFO | COMMAND: uptime | STATUS: SUCCESS | TIME: 1.50s | OUTPUT: up 3 days"));
        assert_eq!(record.kind, AuditKind::Command);
    }

    #[test]
    fn test_error_wins_over_output() {
        let record = AuditRecord::command(
            "uci show network",
            false,
            Duration::ZERO,
            Some("partial"),
            Some("permission denied"),
        );
        assert!(record.payload.contains("ERROR: permission denied"));
        assert!(!record.payload.contains("OUTPUT"));
        assert_eq!(record.level, AuditLevel::Warning);
    }

    #[test]
    fn test_excerpt_truncates_and_flattens() {
        let long = "line\n".repeat(100);
        let text = excerpt(&long);
        assert!(!text.contains('\n'));
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), OUTPUT_EXCERPT_LIMIT + 3);

        assert_eq!(excerpt("a\nb"), "a b");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = excerpt(&"é".repeat(300));
        assert_eq!(text.chars().count(), OUTPUT_EXCERPT_LIMIT + 3);
    }

    #[test]
    fn test_command_newlines_cannot_forge_records() {
        let record = AuditRecord::denied("ps\n2024-01-01 00:00:00 | INFO | COMMAND: fake", "not in whitelist");
        assert!(!record.to_line().contains('\n'));
    }

    #[test]
    fn test_connection_lines() {
        assert_eq!(
            AuditRecord::connect("root@192.168.1.1:22").payload,
            "SSH CONNECT | root@192.168.1.1:22"
        );
        let err = AuditRecord::connection_error("connection refused");
        assert_eq!(err.kind, AuditKind::Error);
        assert!(err.to_line().contains(" | ERROR | SSH ERROR | connection refused"));
    }

    #[test]
    fn test_bypass_is_warning() {
        let record = AuditRecord::bypass("echo hello");
        assert_eq!(record.kind, AuditKind::Bypass);
        assert_eq!(record.level, AuditLevel::Warning);
        assert!(record.payload.contains("echo hello"));
    }
}
