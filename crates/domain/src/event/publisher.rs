use crate::PrinterEvent;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Event sink closed")]
    Closed,
    #[error("Event sink failed: {0}")]
    Sink(String),
}

/// Sink for connection, status and adapter events.
///
/// Implementations must not block; publishing happens on worker and reader tasks.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: PrinterEvent) -> Result<(), PublishError>;
}
