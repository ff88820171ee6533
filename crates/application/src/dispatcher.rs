use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use domain::error::Result;
use domain::event::EventPublisher;
use domain::printer::{ConnectionId, ConnectionSpec, PrintJob, Protocol, TransportKind, TransportProvider};
use domain::PrinterError;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::encoder;
use crate::executor::{SerialExecutor, Task};
use crate::registry::ConnectionRegistry;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_connections: usize,
    pub default_transport: TransportKind,
    pub default_protocol: Protocol,
    /// How long shutdown waits on a busy worker before cancelling it
    pub stop_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            default_transport: TransportKind::Bluetooth,
            default_protocol: Protocol::EscPos,
            stop_grace: Duration::from_secs(2),
        }
    }
}

/// Per-call overrides for connect
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOptions {
    pub transport: Option<TransportKind>,
    pub protocol: Option<Protocol>,
}

/// Validates requests and routes encoded payloads to per-id executors
pub struct Dispatcher {
    registry: ConnectionRegistry,
    transports: Arc<dyn TransportProvider>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        transports: Arc<dyn TransportProvider>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(config.max_connections, transports.clone(), events),
            transports,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Whether the default transport's adapter is present
    pub fn is_available(&self) -> bool {
        self.is_transport_available(self.config.default_transport)
    }

    pub fn is_transport_available(&self, kind: TransportKind) -> bool {
        self.transports.is_available(kind)
    }

    /// Close `id` and wait for the worker to confirm, at most `stop_grace`.
    ///
    /// A worker stuck in a write or open is force-stopped instead.
    async fn settle_close(&self, id: ConnectionId) -> bool {
        let Some(closed) = self.registry.close(id) else {
            return false;
        };
        let grace = self.config.stop_grace;
        match tokio::time::timeout(grace, closed).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!(id, "Connection worker exited before confirming close"),
            Err(_) => {
                warn!(id, grace_ms = grace.as_millis() as u64, "Close stalled behind a busy worker, force stopping");
                self.registry.reset(id, grace).await;
            }
        }
        true
    }

    /// Replace whatever is at `id` with a fresh connection and open it.
    ///
    /// Resolves once the open has run on the id's worker.
    pub async fn connect(
        &self,
        id: ConnectionId,
        address: &str,
        options: ConnectOptions,
    ) -> Result<()> {
        let address = address.trim();
        if address.is_empty() {
            return Err(PrinterError::InvalidArgument(
                "address must not be empty".to_string(),
            ));
        }

        let transport = options.transport.unwrap_or(self.config.default_transport);
        if !self.is_transport_available(transport) {
            return Err(PrinterError::Unavailable(format!(
                "{} transport is not available",
                transport
            )));
        }
        let protocol = options.protocol.unwrap_or(self.config.default_protocol);

        if self.settle_close(id).await {
            debug!(id, "Closed previous connection before reconnect");
        }

        let spec = ConnectionSpec::new(id, transport, address, protocol);
        self.registry.build(spec)?;

        let (tx, rx) = oneshot::channel();
        self.executor(id)?.enqueue(Task::Open { reply: Some(tx) })?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(PrinterError::ConnectFailure(
                "connection worker stopped before open completed".to_string(),
            )),
        }
    }

    /// Close `id` after everything already queued for it. Always succeeds.
    pub async fn disconnect(&self, id: ConnectionId) {
        if self.settle_close(id).await {
            info!(id, "Printer disconnected");
        } else {
            debug!(id, "Disconnect on idle connection");
        }
    }

    /// Close every connection and stop every worker. Always succeeds.
    pub async fn destroy(&self) {
        self.registry.shutdown(self.config.stop_grace).await;
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.registry
            .get(id)
            .is_some_and(|handle| handle.is_connected())
    }

    /// Handle for a live connection, or NotConnected
    pub fn connection(&self, id: ConnectionId) -> Result<ConnectionHandle> {
        match self.registry.get(id) {
            Some(handle) if handle.is_connected() => Ok(handle),
            _ => Err(PrinterError::NotConnected),
        }
    }

    /// Encode `job` for the connection's protocol and queue it.
    ///
    /// Returns as soon as the payload is queued.
    pub fn print(&self, id: ConnectionId, job: &PrintJob) -> Result<()> {
        let handle = self.connection(id)?;
        let payload = encoder::encode(job, handle.protocol()).map_err(|e| {
            warn!(id, error = %e, "Rejected print job");
            PrinterError::InvalidArgument(e.to_string())
        })?;
        self.send(id, "print", payload)
    }

    /// Queue the protocol's self-test page
    pub fn print_test(&self, id: ConnectionId) -> Result<()> {
        let handle = self.connection(id)?;
        self.send(id, "print_test", encoder::self_test(handle.protocol()))
    }

    /// Resolve once every task queued so far for `id` has run
    pub async fn flush(&self, id: ConnectionId) -> Result<()> {
        self.executor(id)?.barrier().await
    }

    fn executor(&self, id: ConnectionId) -> Result<Arc<SerialExecutor>> {
        self.registry.executor(id).ok_or(PrinterError::NotConnected)
    }

    fn send(&self, id: ConnectionId, label: &'static str, payload: Vec<u8>) -> Result<()> {
        debug!(id, task = label, bytes = payload.len(), "Queueing payload");
        self.executor(id)?.enqueue(Task::Send {
            label,
            payload: Bytes::from(payload),
        })
    }
}
