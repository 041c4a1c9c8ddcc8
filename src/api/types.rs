//! API request and response types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execution::CommandRequest;

/// Body of `POST /api/v1/execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    /// The command line to forward.
    pub command: String,
    /// Timeout in seconds; the configured default applies when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ExecuteRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn into_command(self) -> CommandRequest {
        let timeout = self.timeout();
        let request = CommandRequest::new(self.command);
        match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }
}

/// Body of `POST /api/v1/validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub command: String,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_request() {
        let json = r#"{"command": "uptime", "timeout_secs": 10}"#;
        let req: ExecuteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.timeout(), Some(Duration::from_secs(10)));

        let command = req.into_command();
        assert_eq!(command.command, "uptime");
        assert_eq!(command.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_execute_request_without_timeout() {
        let req: ExecuteRequest = serde_json::from_str(r#"{"command": "uptime"}"#).unwrap();
        assert!(req.into_command().timeout.is_none());
    }

    #[test]
    fn test_execute_request_zero_timeout_is_kept() {
        let req: ExecuteRequest =
            serde_json::from_str(r#"{"command": "uptime", "timeout_secs": 0}"#).unwrap();
        assert_eq!(req.into_command().timeout, Some(Duration::ZERO));
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_string(&ErrorResponse::bad_request("nope")).unwrap();
        assert!(json.contains("BAD_REQUEST"));
        assert!(json.contains("nope"));
    }
}
