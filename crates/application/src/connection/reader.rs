use std::sync::Arc;

use domain::PrinterEvent;
use domain::event::EventPublisher;
use domain::printer::{ByteReader, ConnectionId};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Liveness;

const READ_BUFFER: usize = 256;

/// Background consumer of a connection's inbound half.
///
/// Dropping the reader cancels it; nothing ever waits for it to finish.
pub struct Reader {
    cancel: CancellationToken,
}

impl Reader {
    pub(crate) fn spawn(
        id: ConnectionId,
        address: String,
        mut source: ByteReader,
        events: Arc<dyn EventPublisher>,
        liveness: Arc<Liveness>,
        session: u64,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; READ_BUFFER];
            loop {
                let read = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(id, "Reader cancelled");
                        return;
                    }
                    read = source.read(&mut buf) => read,
                };

                match read {
                    Ok(0) => {
                        debug!(id, %address, "Inbound stream reached EOF");
                        break;
                    }
                    Ok(n) => {
                        debug!(id, bytes = n, data = ?&buf[..n], "Status bytes received");
                        let event = PrinterEvent::status_received(id, buf[..n].to_vec());
                        if let Err(e) = events.publish(event).await {
                            warn!(id, "Failed to publish status event: {}", e);
                        }
                    }
                    Err(e) => {
                        debug!(id, %address, error = %e, "Inbound stream failed");
                        break;
                    }
                }
            }

            // A newer session may already own the flag
            if liveness.end(session) {
                info!(id, %address, "Printer link lost");
                let event = PrinterEvent::connection_changed(id, address, false);
                if let Err(e) = events.publish(event).await {
                    warn!(id, "Failed to publish disconnect event: {}", e);
                }
            }
        });

        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
