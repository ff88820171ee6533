pub mod session;

use std::time::Duration;

use application::{ConnectOptions, Dispatcher, DispatcherConfig};
use infrastructure::AgentConfig;
use infrastructure::config::PrinterEntry;
use tracing::{info, warn};

pub fn dispatcher_config(config: &AgentConfig) -> DispatcherConfig {
    DispatcherConfig {
        max_connections: config.max_connections,
        default_transport: config.defaults.transport,
        default_protocol: config.defaults.protocol,
        stop_grace: Duration::from_millis(config.stop_grace_ms),
    }
}

pub fn connect_options(entry: &PrinterEntry) -> ConnectOptions {
    ConnectOptions {
        transport: entry.transport,
        protocol: entry.protocol,
    }
}

/// Connect every configured printer marked `auto_connect`; failures are logged
pub async fn auto_connect(dispatcher: &Dispatcher, config: &AgentConfig) -> usize {
    let mut connected = 0;
    for entry in config.printers.iter().filter(|p| p.auto_connect) {
        match dispatcher
            .connect(entry.id, &entry.address, connect_options(entry))
            .await
        {
            Ok(()) => {
                info!(id = entry.id, address = %entry.address, "Auto-connected printer");
                connected += 1;
            }
            Err(e) => warn!(id = entry.id, address = %entry.address, error = %e, "Auto-connect failed"),
        }
    }
    connected
}
