use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use domain::PrinterError;
use domain::error::Result;
use domain::event::EventPublisher;
use domain::printer::{ConnectionId, ConnectionSpec, TransportProvider};
use futures::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionHandle};
use crate::executor::{SerialExecutor, Task};

#[derive(Default)]
struct Slot {
    connection: Option<ConnectionHandle>,
    executor: Option<Arc<SerialExecutor>>,
}

/// Fixed set of connection slots, each paired with its own executor
pub struct ConnectionRegistry {
    transports: Arc<dyn TransportProvider>,
    events: Arc<dyn EventPublisher>,
    slots: Mutex<Vec<Slot>>,
}

impl ConnectionRegistry {
    pub fn new(
        capacity: usize,
        transports: Arc<dyn TransportProvider>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            transports,
            events,
            slots: Mutex::new(slots),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create the connection for `spec.id` without opening it.
    ///
    /// Any connection already at that id is closed by its worker before the
    /// new one is installed.
    pub fn build(&self, spec: ConnectionSpec) -> Result<ConnectionHandle> {
        let id = spec.id;
        let mut slots = self.lock();
        let capacity = slots.len();
        let slot = slots.get_mut(id as usize).ok_or_else(|| {
            PrinterError::InvalidArgument(format!(
                "connection id {} out of range (0..{})",
                id, capacity
            ))
        })?;

        let executor = slot
            .executor
            .get_or_insert_with(|| Arc::new(SerialExecutor::new(id, self.events.clone())))
            .clone();

        let connection = Connection::new(spec, self.transports.clone(), self.events.clone());
        let handle = connection.handle();
        executor.enqueue(Task::Install(connection))?;

        debug!(id, address = %handle.spec().address, "Connection built");
        slot.connection = Some(handle.clone());
        Ok(handle)
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.lock()
            .get(id as usize)
            .and_then(|slot| slot.connection.clone())
    }

    pub fn executor(&self, id: ConnectionId) -> Option<Arc<SerialExecutor>> {
        self.lock()
            .get(id as usize)
            .and_then(|slot| slot.executor.clone())
    }

    /// Enqueue a close for `id` behind whatever is already queued.
    ///
    /// Returns `None` when there was nothing to close.
    pub fn close(&self, id: ConnectionId) -> Option<oneshot::Receiver<()>> {
        let mut slots = self.lock();
        let slot = slots.get_mut(id as usize)?;
        slot.connection.take()?;

        let executor = slot.executor.as_ref()?;
        let (tx, rx) = oneshot::channel();
        match executor.enqueue(Task::Close { reply: Some(tx) }) {
            Ok(()) => Some(rx),
            Err(e) => {
                debug!(id, error = %e, "Close skipped");
                None
            }
        }
    }

    /// Empty the slot at `id` and force-stop its executor.
    ///
    /// Used when a queued close is stuck behind a stalled task; the next
    /// build at `id` starts a fresh executor.
    pub async fn reset(&self, id: ConnectionId, grace: Duration) {
        let executor = {
            let mut slots = self.lock();
            let Some(slot) = slots.get_mut(id as usize) else {
                return;
            };
            slot.connection = None;
            slot.executor.take()
        };
        if let Some(executor) = executor {
            executor.force_stop(grace).await;
        }
    }

    /// Enqueue a close for every occupied slot
    pub fn close_all(&self) -> Vec<oneshot::Receiver<()>> {
        let ids: Vec<ConnectionId> = self
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.connection.is_some())
            .map(|(index, _)| index as ConnectionId)
            .collect();

        ids.into_iter().filter_map(|id| self.close(id)).collect()
    }

    /// Close everything, stop every executor and empty all slots
    pub async fn shutdown(&self, grace: Duration) {
        let closes = self.close_all();
        info!(count = closes.len(), "Closing printer connections");
        for outcome in join_all(
            closes
                .into_iter()
                .map(|rx| tokio::time::timeout(grace, rx)),
        )
        .await
        {
            if outcome.is_err() {
                warn!("Connection close did not complete in time");
            }
        }

        let executors: Vec<Arc<SerialExecutor>> = {
            let mut slots = self.lock();
            slots
                .iter_mut()
                .filter_map(|slot| {
                    slot.connection = None;
                    slot.executor.take()
                })
                .collect()
        };
        join_all(executors.iter().map(|executor| executor.stop(grace))).await;
        info!("Connection registry shut down");
    }
}
