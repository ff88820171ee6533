//! Domain layer - Printer model with no infrastructure dependencies
//!
//! This crate contains:
//! - Connection descriptors (ConnectionSpec, TransportKind, Protocol)
//! - The connection state machine
//! - Protocol-agnostic print jobs (PrintJob, PrintConfig, Element)
//! - State events and the publisher interface
//! - The transport provider interface (traits)
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Print jobs are validated when they are parsed
//! - Testable in isolation

pub mod error;
pub mod event;
pub mod printer;

// Re-export commonly used types
pub use error::PrinterError;
pub use event::{AdapterSignal, AdapterState, PrinterEvent};
pub use printer::{
    ConnectionId, ConnectionSpec, ConnectionState, Element, PrintConfig, PrintJob, Protocol,
    TransportKind,
};
