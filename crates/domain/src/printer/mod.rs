mod connection_state;
mod job;
mod protocol;
mod transport;

pub use connection_state::ConnectionState;
pub use job::{
    Alignment, BarcodeElement, CutElement, Element, ErrorLevel, FeedElement, ImageElement,
    PrintConfig, PrintJob, QrCodeElement, Symbology, TextElement,
};
pub use protocol::{Protocol, TransportKind};
pub use transport::{
    ByteReader, ByteWriter, ConnectionId, ConnectionSpec, PrinterStream, TransportProvider,
};
