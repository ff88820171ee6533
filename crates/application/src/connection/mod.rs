//! A single device binding and its inbound reader.
//!
//! A [`Connection`] is owned by exactly one serial executor worker; callers
//! only ever see a [`ConnectionHandle`], which can observe state but has no
//! way to write.

mod reader;

pub use reader::Reader;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use domain::event::EventPublisher;
use domain::printer::{ByteWriter, ConnectionId, ConnectionSpec, ConnectionState, Protocol};
use domain::{PrinterError, PrinterEvent};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use domain::error::Result;
use domain::printer::TransportProvider;

/// Upper bound on a graceful stream shutdown during close
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Stream-alive flag keyed by open session.
///
/// Each successful open starts a new session. The reader of an old session
/// can only end its own session, never a newer one.
#[derive(Debug, Default)]
pub struct Liveness {
    current: AtomicU64,
    next: AtomicU64,
}

impl Liveness {
    fn begin(&self) -> u64 {
        let session = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.current.store(session, Ordering::SeqCst);
        session
    }

    /// Returns true if `session` was still the live one
    fn end(&self, session: u64) -> bool {
        self.current
            .compare_exchange(session, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn end_any(&self) -> bool {
        self.current.swap(0, Ordering::SeqCst) != 0
    }

    pub fn is_alive(&self) -> bool {
        self.current.load(Ordering::SeqCst) != 0
    }
}

/// Read-only view of a connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    spec: ConnectionSpec,
    state: watch::Receiver<ConnectionState>,
    liveness: Arc<Liveness>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.spec.id
    }

    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    pub fn protocol(&self) -> Protocol {
        self.spec.protocol
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Connected and the stream has not been observed dead
    pub fn is_connected(&self) -> bool {
        self.state().is_connected() && self.liveness.is_alive()
    }
}

pub struct Connection {
    spec: ConnectionSpec,
    transports: Arc<dyn TransportProvider>,
    events: Arc<dyn EventPublisher>,
    state: watch::Sender<ConnectionState>,
    liveness: Arc<Liveness>,
    writer: Option<ByteWriter>,
    reader: Option<Reader>,
    last_error: Option<PrinterError>,
}

impl Connection {
    pub fn new(
        spec: ConnectionSpec,
        transports: Arc<dyn TransportProvider>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            spec,
            transports,
            events,
            state,
            liveness: Arc::new(Liveness::default()),
            writer: None,
            reader: None,
            last_error: None,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            spec: self.spec.clone(),
            state: self.state.subscribe(),
            liveness: self.liveness.clone(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.spec.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn last_error(&self) -> Option<&PrinterError> {
        self.last_error.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected() && self.liveness.is_alive() && self.writer.is_some()
    }

    /// Open the transport channel. A no-op when already connected.
    pub async fn open(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        // Tear down a stream the reader reported dead
        if self.state() != ConnectionState::Disconnected {
            self.close().await;
        }

        let next = self
            .state()
            .to_connecting()
            .map_err(|e| PrinterError::ConnectFailure(e.to_string()))?;
        self.state.send_replace(next);

        let id = self.spec.id;
        info!(
            id,
            address = %self.spec.address,
            transport = %self.spec.transport,
            protocol = %self.spec.protocol,
            "Opening printer connection"
        );

        match self
            .transports
            .open(self.spec.transport, &self.spec.address)
            .await
        {
            Ok(stream) => {
                let session = self.liveness.begin();
                self.writer = Some(stream.writer);
                if let Some(source) = stream.reader {
                    self.reader = Some(Reader::spawn(
                        id,
                        self.spec.address.clone(),
                        source,
                        self.events.clone(),
                        self.liveness.clone(),
                        session,
                    ));
                }
                let next = self
                    .state()
                    .to_connected()
                    .unwrap_or(ConnectionState::Connected);
                self.state.send_replace(next);
                self.last_error = None;

                info!(id, address = %self.spec.address, "Printer connected");
                let event = PrinterEvent::connection_changed(id, self.spec.address.clone(), true);
                publish(&self.events, id, event).await;
                Ok(())
            }
            Err(e) => {
                warn!(id, address = %self.spec.address, error = %e, "Failed to open printer connection");
                self.state.send_replace(ConnectionState::Disconnected);
                let error = match e {
                    PrinterError::ConnectFailure(_) => e,
                    other => PrinterError::ConnectFailure(other.to_string()),
                };
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Tear the channel down. Safe to call in any state, any number of times.
    pub async fn close(&mut self) {
        if self.state() == ConnectionState::Disconnected
            && self.writer.is_none()
            && self.reader.is_none()
        {
            return;
        }

        let id = self.spec.id;
        self.state.send_replace(self.state().to_closing());

        if let Some(reader) = self.reader.take() {
            reader.cancel();
        }
        let was_alive = self.liveness.end_any();

        if let Some(mut writer) = self.writer.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, writer.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(id, error = %e, "Stream shutdown failed"),
                Err(_) => warn!(id, "Stream shutdown timed out"),
            }
        }

        self.state.send_replace(self.state().to_disconnected());
        info!(id, address = %self.spec.address, "Printer connection closed");

        if was_alive {
            let event = PrinterEvent::connection_changed(id, self.spec.address.clone(), false);
            publish(&self.events, id, event).await;
        }
    }

    /// Write and flush the whole buffer
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(PrinterError::NotConnected);
        }
        let result = match self.writer.as_mut() {
            Some(writer) => write_all(writer, bytes).await,
            None => return Err(PrinterError::NotConnected),
        };

        match result {
            Ok(()) => {
                debug!(id = self.spec.id, bytes = bytes.len(), "Payload written");
                Ok(())
            }
            Err(e) => {
                warn!(id = self.spec.id, error = %e, "Write failed, closing connection");
                self.close().await;
                Err(PrinterError::WriteFailed(e.to_string()))
            }
        }
    }
}

async fn publish(events: &Arc<dyn EventPublisher>, id: ConnectionId, event: PrinterEvent) {
    if let Err(e) = events.publish(event).await {
        warn!(id, "Failed to publish event: {}", e);
    }
}

async fn write_all(writer: &mut ByteWriter, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
