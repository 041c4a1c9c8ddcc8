//! Connection state machine.

use serde::Serialize;

/// Lifecycle state of the shared router connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection; initial state and state after disconnect.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Authenticated connection available for commands.
    Connected,
    /// The last connect attempt failed.
    Failed,
}

impl ConnectionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Disconnected -> Connecting
    /// - Failed -> Connecting
    /// - Connecting -> Connected
    /// - Connecting -> Failed
    /// - Connected -> Disconnected
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (*self, target),
            (Disconnected, Connecting)
                | (Failed, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Disconnected)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ConnectionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::GatewayError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if commands can be sent.
    pub fn can_execute(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_cycle() {
        let mut state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Disconnected);

        assert!(state.transition_to(ConnectionState::Connecting).is_ok());
        assert!(state.transition_to(ConnectionState::Connected).is_ok());
        assert!(state.can_execute());
        assert!(state.transition_to(ConnectionState::Disconnected).is_ok());
        assert!(!state.can_execute());
    }

    #[test]
    fn test_failed_can_retry() {
        let mut state = ConnectionState::Connecting;
        assert!(state.transition_to(ConnectionState::Failed).is_ok());
        assert!(!state.can_execute());
        assert!(state.transition_to(ConnectionState::Connecting).is_ok());
    }

    #[test]
    fn test_invalid_disconnected_to_connected() {
        let mut state = ConnectionState::Disconnected;
        assert!(state.transition_to(ConnectionState::Connected).is_err());
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_invalid_double_connect() {
        let mut state = ConnectionState::Connected;
        assert!(state.transition_to(ConnectionState::Connecting).is_err());
        assert_eq!(state, ConnectionState::Connected);
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
    }
}
