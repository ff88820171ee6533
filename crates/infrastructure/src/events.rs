use async_trait::async_trait;
use domain::PrinterEvent;
use domain::event::{EventPublisher, PublishError};
use tokio::sync::broadcast;

/// Fan-out publisher; every subscriber receives every event
#[derive(Clone)]
pub struct BroadcastEventPublisher {
    tx: broadcast::Sender<PrinterEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: PrinterEvent) -> Result<(), PublishError> {
        // No subscribers is not an error; events are fire-and-forget
        if self.tx.send(event).is_err() {
            tracing::trace!("Event dropped, no subscribers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let publisher = BroadcastEventPublisher::default();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        publisher
            .publish(PrinterEvent::connection_changed(0, "AA:BB", true))
            .await
            .unwrap();

        assert_eq!(first.recv().await.unwrap().code(), Some(1));
        assert_eq!(second.recv().await.unwrap().code(), Some(1));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let publisher = BroadcastEventPublisher::new(4);
        assert!(
            publisher
                .publish(PrinterEvent::status_received(1, vec![0x00]))
                .await
                .is_ok()
        );
    }
}
