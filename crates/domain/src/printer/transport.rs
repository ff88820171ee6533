use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use super::protocol::{Protocol, TransportKind};
use crate::error::PrinterError;

/// Small integer handle identifying one logical device binding
pub type ConnectionId = u8;

pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Everything needed to construct a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub id: ConnectionId,
    pub transport: TransportKind,
    pub address: String,
    pub protocol: Protocol,
}

impl ConnectionSpec {
    pub fn new(
        id: ConnectionId,
        transport: TransportKind,
        address: impl Into<String>,
        protocol: Protocol,
    ) -> Self {
        Self {
            id,
            transport,
            address: address.into(),
            protocol,
        }
    }
}

/// An open channel to a printer.
///
/// The inbound half is optional: spool files and similar sinks have no
/// status channel.
pub struct PrinterStream {
    pub writer: ByteWriter,
    pub reader: Option<ByteReader>,
}

impl PrinterStream {
    pub fn write_only(writer: ByteWriter) -> Self {
        Self {
            writer,
            reader: None,
        }
    }

    pub fn new(writer: ByteWriter, reader: ByteReader) -> Self {
        Self {
            writer,
            reader: Some(reader),
        }
    }

    /// Split a bidirectional stream into independent halves
    pub fn split<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(Box::new(writer), Box::new(reader))
    }
}

/// Transport provider trait that infrastructure implementations must provide
#[async_trait]
pub trait TransportProvider: Send + Sync {
    /// Whether an adapter for this transport is present at all
    fn is_available(&self, kind: TransportKind) -> bool;

    /// Open a channel to `address`
    async fn open(&self, kind: TransportKind, address: &str)
    -> Result<PrinterStream, PrinterError>;
}
