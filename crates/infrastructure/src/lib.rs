//! Infrastructure layer - Transports, event fan-out and configuration

pub mod adapter;
pub mod config;
pub mod events;
pub mod transport;

pub use adapter::AdapterMonitor;
pub use config::AgentConfig;
pub use events::BroadcastEventPublisher;
pub use transport::{MockTransport, TransportFactory};
