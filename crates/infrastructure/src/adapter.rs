use std::time::Duration;

use domain::{AdapterSignal, AdapterState};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::transport::BluetoothConfig;

/// Polls for a Bluetooth adapter and broadcasts On/Off transitions
pub struct AdapterMonitor {
    bluetooth: BluetoothConfig,
    interval: Duration,
    tx: broadcast::Sender<AdapterSignal>,
}

impl AdapterMonitor {
    pub fn new(bluetooth: BluetoothConfig, interval: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self {
            bluetooth,
            interval,
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdapterSignal> {
        self.tx.subscribe()
    }

    fn probe(&self) -> AdapterState {
        if self.bluetooth.adapter_present() {
            AdapterState::On
        } else {
            AdapterState::Off
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            let mut last: Option<AdapterState> = None;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Adapter monitor stopped");
                        break;
                    }
                    _ = timer.tick() => {
                        let state = self.probe();
                        if last != Some(state) {
                            info!(state = ?state, "Bluetooth adapter state changed");
                            let _ = self.tx.send(AdapterSignal::StateChanged(state));
                            last = Some(state);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_monitor_reports_initial_state_once() {
        let bluetooth = BluetoothConfig {
            adapter_path: PathBuf::from("/definitely/not/here"),
            ..BluetoothConfig::default()
        };
        let monitor = AdapterMonitor::new(bluetooth, Duration::from_millis(10));
        let mut rx = monitor.subscribe();
        let cancel = CancellationToken::new();
        let handle = monitor.spawn(cancel.clone());

        let first = rx.recv().await.unwrap();
        assert_eq!(first, AdapterSignal::StateChanged(AdapterState::Off));

        // Unchanged state is not re-broadcast
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
    }
}
