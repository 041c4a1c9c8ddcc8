//! Error types for openwrt-gate.

use std::time::Duration;

use thiserror::Error;

/// Main error type for gateway operations.
///
/// Only [`GatewayError::Configuration`] is allowed to abort startup. Every
/// other variant is caught at the `execute()`/`connect()` boundary and turned
/// into a structured outcome.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Command rejected by the policy engine.
    #[error("{reason}")]
    PolicyDenied { reason: String },

    /// Missing or conflicting configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No live session, or (re)connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Remote invocation exceeded its deadline.
    #[error("Command execution timed out after {0:?}")]
    Timeout(Duration),

    /// Any other I/O or protocol failure during a remote call.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid connection state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::ConnectionState,
        to: crate::session::ConnectionState,
    },

    /// A policy rule failed to compile.
    #[error("invalid policy pattern for rule '{rule}': {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<russh::Error> for GatewayError {
    fn from(err: russh::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Convenience Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_mentions_duration() {
        let err = GatewayError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Command execution timed out after 30s");
    }

    #[test]
    fn test_policy_denied_display_is_reason() {
        let err = GatewayError::PolicyDenied {
            reason: "not in whitelist".into(),
        };
        assert_eq!(err.to_string(), "not in whitelist");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_invalid_pattern_display() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = GatewayError::InvalidPattern {
            rule: "broken".into(),
            source,
        };
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_connection_display() {
        let err = GatewayError::Connection("refused".into());
        assert!(err.to_string().contains("connection error"));
        assert!(err.to_string().contains("refused"));
    }
}
