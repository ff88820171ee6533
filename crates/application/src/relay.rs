use std::sync::Arc;

use domain::event::EventPublisher;
use domain::{AdapterSignal, AdapterState, PrinterEvent};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Last adapter state seen by the relay
#[derive(Debug, Clone)]
pub struct AdapterStatus {
    rx: watch::Receiver<Option<AdapterState>>,
}

impl AdapterStatus {
    /// A status that never changes, for hosts without an adapter source
    pub fn fixed(state: Option<AdapterState>) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    pub fn state(&self) -> Option<AdapterState> {
        *self.rx.borrow()
    }
}

/// Republishes adapter and link signals as printer events
pub struct AdapterStateRelay {
    events: Arc<dyn EventPublisher>,
    state: watch::Sender<Option<AdapterState>>,
}

impl AdapterStateRelay {
    pub fn new(events: Arc<dyn EventPublisher>) -> Self {
        let (state, _rx) = watch::channel(None);
        Self { events, state }
    }

    pub fn status(&self) -> AdapterStatus {
        AdapterStatus {
            rx: self.state.subscribe(),
        }
    }

    async fn handle(&self, signal: AdapterSignal) {
        let event = match signal {
            AdapterSignal::StateChanged(state) => {
                let previous = self.state.send_replace(Some(state));
                if previous == Some(state) {
                    return;
                }
                info!(state = ?state, code = state.code(), "Adapter state changed");
                PrinterEvent::adapter_state(state)
            }
            AdapterSignal::LinkConnected { address } => {
                debug!(address = ?address, "Link connected");
                PrinterEvent::link_changed(address, true)
            }
            AdapterSignal::LinkDisconnected { address } => {
                debug!(address = ?address, "Link disconnected");
                PrinterEvent::link_changed(address, false)
            }
        };

        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish adapter event: {}", e);
        }
    }

    /// Run until `source` closes or `cancel` fires
    pub fn spawn(
        self,
        mut source: broadcast::Receiver<AdapterSignal>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    _ = cancel.cancelled() => break,
                    signal = source.recv() => signal,
                };

                match signal {
                    Ok(signal) => self.handle(signal).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Adapter relay lagged behind its source");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Adapter relay stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrastructure::BroadcastEventPublisher;

    #[tokio::test]
    async fn test_relay_republishes_signals() {
        let events = BroadcastEventPublisher::default();
        let mut rx = events.subscribe();
        let relay = AdapterStateRelay::new(Arc::new(events.clone()));
        let status = relay.status();
        let (tx, source) = broadcast::channel(8);
        let handle = relay.spawn(source, CancellationToken::new());

        assert_eq!(status.state(), None);
        tx.send(AdapterSignal::StateChanged(AdapterState::On)).unwrap();
        assert_eq!(rx.recv().await.unwrap().code(), Some(12));
        assert_eq!(status.state(), Some(AdapterState::On));

        // Repeated state is not re-published
        tx.send(AdapterSignal::StateChanged(AdapterState::On)).unwrap();
        tx.send(AdapterSignal::LinkDisconnected {
            address: Some("AA:BB".into()),
        })
        .unwrap();
        match rx.recv().await.unwrap() {
            PrinterEvent::ConnectionChanged {
                id,
                address,
                connected,
                ..
            } => {
                assert_eq!(id, None);
                assert_eq!(address.as_deref(), Some("AA:BB"));
                assert!(!connected);
            }
            other => panic!("unexpected event {:?}", other),
        }

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_stops_on_cancel() {
        let relay = AdapterStateRelay::new(Arc::new(BroadcastEventPublisher::default()));
        let (_tx, source) = broadcast::channel::<AdapterSignal>(8);
        let cancel = CancellationToken::new();
        let handle = relay.spawn(source, cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
    }
}
