//! Application layer - Connection lifecycle and ordered print dispatch
//!
//! - `encoder`: pure job → bytes mapping for ESC/POS, TSC and CPCL
//! - `connection`: one device binding plus its inbound reader
//! - `executor`: the per-id FIFO worker that owns a connection
//! - `registry`: fixed slots of connection/executor pairs
//! - `dispatcher`: request validation and routing
//! - `relay`: adapter signals → printer events
//! - `api`: JSON request/response boundary

pub mod api;
pub mod connection;
pub mod dispatcher;
pub mod encoder;
pub mod executor;
pub mod registry;
pub mod relay;

pub use api::{PrinterApi, Request, Response};
pub use connection::{Connection, ConnectionHandle};
pub use dispatcher::{ConnectOptions, Dispatcher, DispatcherConfig};
pub use encoder::{EncodeError, EscPosBuilder};
pub use executor::SerialExecutor;
pub use registry::ConnectionRegistry;
pub use relay::{AdapterStateRelay, AdapterStatus};
