use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod publisher;
pub use publisher::{EventPublisher, PublishError};

use crate::printer::ConnectionId;

/// Host adapter (Bluetooth radio) state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterState {
    Off,
    TurningOn,
    On,
    TurningOff,
}

impl AdapterState {
    /// Integer code pushed to the host: Off=10, TurningOn=11, On=12, TurningOff=13
    pub fn code(&self) -> i32 {
        match self {
            Self::Off => 10,
            Self::TurningOn => 11,
            Self::On => 12,
            Self::TurningOff => 13,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(Self::Off),
            11 => Some(Self::TurningOn),
            12 => Some(Self::On),
            13 => Some(Self::TurningOff),
            _ => None,
        }
    }
}

/// Raw signal from an external adapter broadcast source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSignal {
    StateChanged(AdapterState),
    LinkConnected { address: Option<String> },
    LinkDisconnected { address: Option<String> },
}

/// State events pushed to the application layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PrinterEvent {
    /// Host adapter changed state
    AdapterStateChanged {
        state: AdapterState,
        code: i32,
        timestamp: DateTime<Utc>,
    },

    /// A printer link came up or went down
    ConnectionChanged {
        id: Option<ConnectionId>,
        address: Option<String>,
        connected: bool,
        code: i32,
        timestamp: DateTime<Utc>,
    },

    /// Inbound status/acknowledgement bytes from a device
    StatusReceived {
        id: ConnectionId,
        bytes: Vec<u8>,
        timestamp: DateTime<Utc>,
    },

    /// A queued task failed; the queue carried on
    TaskFailed {
        id: ConnectionId,
        task: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl PrinterEvent {
    /// Create an AdapterStateChanged event
    pub fn adapter_state(state: AdapterState) -> Self {
        Self::AdapterStateChanged {
            state,
            code: state.code(),
            timestamp: Utc::now(),
        }
    }

    /// Create a ConnectionChanged event for a registered connection
    pub fn connection_changed(id: ConnectionId, address: impl Into<String>, connected: bool) -> Self {
        Self::ConnectionChanged {
            id: Some(id),
            address: Some(address.into()),
            connected,
            code: i32::from(connected),
            timestamp: Utc::now(),
        }
    }

    /// Create a ConnectionChanged event from an adapter-level link signal
    pub fn link_changed(address: Option<String>, connected: bool) -> Self {
        Self::ConnectionChanged {
            id: None,
            address,
            connected,
            code: i32::from(connected),
            timestamp: Utc::now(),
        }
    }

    /// Create a StatusReceived event
    pub fn status_received(id: ConnectionId, bytes: Vec<u8>) -> Self {
        Self::StatusReceived {
            id,
            bytes,
            timestamp: Utc::now(),
        }
    }

    /// Create a TaskFailed event
    pub fn task_failed(id: ConnectionId, task: impl Into<String>, error: impl Into<String>) -> Self {
        Self::TaskFailed {
            id,
            task: task.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// Integer state code, for events that carry one
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::AdapterStateChanged { code, .. } | Self::ConnectionChanged { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_codes_round_trip() {
        for state in [
            AdapterState::Off,
            AdapterState::TurningOn,
            AdapterState::On,
            AdapterState::TurningOff,
        ] {
            assert_eq!(AdapterState::from_code(state.code()), Some(state));
        }
        assert_eq!(AdapterState::from_code(0), None);
    }

    #[test]
    fn test_connection_codes() {
        assert_eq!(PrinterEvent::connection_changed(0, "x", true).code(), Some(1));
        assert_eq!(PrinterEvent::link_changed(None, false).code(), Some(0));
        assert_eq!(PrinterEvent::status_received(0, vec![0x12]).code(), None);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = PrinterEvent::task_failed(2, "send", "Not connected");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TaskFailed");
        assert_eq!(json["id"], 2);
        assert_eq!(json["task"], "send");
    }
}
