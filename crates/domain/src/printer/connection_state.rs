use serde::{Deserialize, Serialize};

/// Connection state for printer connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// No open channel
    #[default]
    Disconnected,
    /// Channel open in progress
    Connecting,
    /// Channel open and writable
    Connected,
    /// Channel being torn down
    Closing,
}

impl ConnectionState {
    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Can only complete connection from Connecting state"),
        }
    }

    /// Transition to closing state. Close is legal from any state.
    pub fn to_closing(&self) -> Self {
        Self::Closing
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(!state.is_connected());
    }

    #[test]
    fn test_transition_disconnected_to_connecting() {
        let state = ConnectionState::Disconnected;
        let next = state.to_connecting().unwrap();
        assert_eq!(next, ConnectionState::Connecting);
        assert!(!next.is_connected());
    }

    #[test]
    fn test_transition_connecting_to_connected() {
        let state = ConnectionState::Connecting;
        let next = state.to_connected().unwrap();
        assert_eq!(next, ConnectionState::Connected);
        assert!(next.is_connected());
    }

    #[test]
    fn test_cannot_connect_twice() {
        assert!(ConnectionState::Connected.to_connecting().is_err());
        assert!(ConnectionState::Connecting.to_connecting().is_err());
        assert!(ConnectionState::Closing.to_connecting().is_err());
    }

    #[test]
    fn test_cannot_skip_connecting() {
        assert!(ConnectionState::Disconnected.to_connected().is_err());
        assert!(ConnectionState::Closing.to_connected().is_err());
    }

    #[test]
    fn test_close_from_any_state() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Closing,
        ] {
            let closing = state.to_closing();
            assert_eq!(closing, ConnectionState::Closing);
            assert_eq!(closing.to_disconnected(), ConnectionState::Disconnected);
        }
    }
}
