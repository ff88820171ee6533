//! Strictly ordered, single-worker task queue for one connection id.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use domain::error::Result;
use domain::event::EventPublisher;
use domain::printer::ConnectionId;
use domain::{PrinterError, PrinterEvent};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;

/// Deferred work for one connection id
pub(crate) enum Task {
    /// Replace the worker's connection, closing the previous one first
    Install(Connection),
    Open {
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Close {
        reply: Option<oneshot::Sender<()>>,
    },
    Send {
        label: &'static str,
        payload: Bytes,
    },
    /// Completes once every earlier task has run
    Barrier(oneshot::Sender<()>),
}

impl Task {
    fn name(&self) -> &'static str {
        match self {
            Self::Install(_) => "install",
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::Send { label, .. } => *label,
            Self::Barrier(_) => "barrier",
        }
    }
}

struct Inner {
    tx: Option<mpsc::UnboundedSender<Task>>,
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    stopped: bool,
}

pub struct SerialExecutor {
    id: ConnectionId,
    events: Arc<dyn EventPublisher>,
    inner: Mutex<Inner>,
}

impl SerialExecutor {
    pub fn new(id: ConnectionId, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            id,
            events,
            inner: Mutex::new(Inner {
                tx: None,
                handle: None,
                cancel: CancellationToken::new(),
                stopped: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Worker has been started and not yet stopped
    pub fn is_running(&self) -> bool {
        let inner = self.lock();
        !inner.stopped && inner.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Append a task; the worker starts on first use
    pub(crate) fn enqueue(&self, task: Task) -> Result<()> {
        let mut inner = self.lock();
        if inner.stopped {
            return Err(PrinterError::NotConnected);
        }

        if inner.tx.is_none() {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = Worker {
                id: self.id,
                events: self.events.clone(),
                connection: None,
            };
            debug!(id = self.id, "Starting serial executor worker");
            inner.handle = Some(tokio::spawn(worker.run(rx, inner.cancel.clone())));
            inner.tx = Some(tx);
        }

        let tx = inner.tx.as_ref().ok_or(PrinterError::NotConnected)?;
        tx.send(task).map_err(|_| PrinterError::NotConnected)
    }

    /// Resolve once all previously enqueued tasks have completed
    pub async fn barrier(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Task::Barrier(tx))?;
        rx.await
            .map_err(|_| PrinterError::TaskFailure(format!("executor {} stopped", self.id)))
    }

    /// Close the queue and let the worker drain.
    ///
    /// A worker still busy after `grace` is cancelled, and aborted if it
    /// ignores cancellation for another `grace`.
    pub async fn stop(&self, grace: Duration) {
        let Some((mut handle, cancel)) = self.shut() else {
            return;
        };

        if tokio::time::timeout(grace, &mut handle).await.is_ok() {
            debug!(id = self.id, "Serial executor drained");
            return;
        }

        warn!(id = self.id, "Serial executor did not drain in time, cancelling");
        self.terminate(handle, cancel, grace).await;
    }

    /// Cancel the worker without draining; queued tasks are dropped
    pub async fn force_stop(&self, grace: Duration) {
        if let Some((handle, cancel)) = self.shut() {
            warn!(id = self.id, "Force stopping serial executor");
            self.terminate(handle, cancel, grace).await;
        }
    }

    fn shut(&self) -> Option<(JoinHandle<()>, CancellationToken)> {
        let mut inner = self.lock();
        inner.stopped = true;
        inner.tx.take();
        let cancel = inner.cancel.clone();
        inner.handle.take().map(|handle| (handle, cancel))
    }

    async fn terminate(&self, mut handle: JoinHandle<()>, cancel: CancellationToken, grace: Duration) {
        cancel.cancel();
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            error!(id = self.id, "Serial executor ignored cancellation, aborting");
            handle.abort();
        }
    }
}

struct Worker {
    id: ConnectionId,
    events: Arc<dyn EventPublisher>,
    connection: Option<Connection>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Task>, cancel: CancellationToken) {
        loop {
            let task = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                task = rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let name = task.name();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(id = self.id, task = name, "Task cancelled during shutdown");
                    break;
                }
                outcome = AssertUnwindSafe(self.execute(task)).catch_unwind() => outcome,
            };

            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    warn!(id = self.id, task = name, error = %e, "Task failed");
                    e.to_string()
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(id = self.id, task = name, panic = %message, "Task panicked");
                    PrinterError::TaskFailure(message).to_string()
                }
            };

            let event = PrinterEvent::task_failed(self.id, name, failure);
            if let Err(e) = self.events.publish(event).await {
                warn!(id = self.id, "Failed to publish task failure: {}", e);
            }
        }

        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        info!(id = self.id, "Serial executor worker stopped");
    }

    async fn execute(&mut self, task: Task) -> Result<()> {
        match task {
            Task::Install(connection) => {
                if let Some(mut old) = self.connection.take() {
                    old.close().await;
                }
                self.connection = Some(connection);
                Ok(())
            }
            Task::Open { reply } => {
                let result = match self.connection.as_mut() {
                    Some(connection) => connection.open().await,
                    None => Err(PrinterError::NotConnected),
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result.clone());
                }
                result
            }
            Task::Close { reply } => {
                if let Some(mut connection) = self.connection.take() {
                    connection.close().await;
                }
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                Ok(())
            }
            Task::Send { payload, .. } => match self.connection.as_mut() {
                Some(connection) => connection.write(&payload).await,
                None => Err(PrinterError::NotConnected),
            },
            Task::Barrier(done) => {
                let _ = done.send(());
                Ok(())
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
