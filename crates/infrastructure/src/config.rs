use config::{Config, ConfigError, Environment, File};
use domain::printer::{ConnectionId, Protocol, TransportKind};
use serde::{Deserialize, Serialize};

use crate::transport::{BluetoothConfig, NetworkConfig, SerialConfig, TransportFactory};

/// A printer known ahead of time
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PrinterEntry {
    pub id: ConnectionId,
    pub address: String,
    #[serde(default)]
    pub transport: Option<TransportKind>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub auto_connect: bool,
}

/// Used when a connect request does not name a transport or protocol
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    /// Number of connection slots (ids 0..max_connections)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// How long destroy waits for a worker to drain before aborting it
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    #[serde(default = "default_adapter_poll_ms")]
    pub adapter_poll_ms: u64,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub printers: Vec<PrinterEntry>,
}

fn default_max_connections() -> usize {
    4
}
fn default_stop_grace_ms() -> u64 {
    2000
}
fn default_adapter_poll_ms() -> u64 {
    2000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            stop_grace_ms: default_stop_grace_ms(),
            adapter_poll_ms: default_adapter_poll_ms(),
            defaults: DefaultsConfig::default(),
            serial: SerialConfig::default(),
            bluetooth: BluetoothConfig::default(),
            network: NetworkConfig::default(),
            printers: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Local config file, e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Per-environment overrides, e.g. config/production.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. PRINTER__DEFAULTS__PROTOCOL=tsc)
            .add_source(Environment::with_prefix("PRINTER").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn transport_factory(&self) -> TransportFactory {
        TransportFactory::new(
            self.serial.clone(),
            self.bluetooth.clone(),
            self.network.clone(),
        )
    }

    pub fn printer(&self, id: ConnectionId) -> Option<&PrinterEntry> {
        self.printers.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.stop_grace_ms, 2000);
        assert_eq!(config.defaults.transport, TransportKind::Bluetooth);
        assert_eq!(config.defaults.protocol, Protocol::EscPos);
        assert_eq!(config.network.port, 9100);
        assert!(config.printers.is_empty());
    }

    #[test]
    fn test_load_default_toml() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
max_connections = 2

[defaults]
protocol = "tsc"
transport = "network"

[serial]
baud_rate = 19200

[[printers]]
id = 1
address = "192.168.1.80"
protocol = "cpcl"
auto_connect = true
"#
        )
        .unwrap();

        let config = AgentConfig::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.defaults.protocol, Protocol::Tsc);
        assert_eq!(config.defaults.transport, TransportKind::Network);
        assert_eq!(config.serial.baud_rate, 19200);

        let printer = config.printer(1).unwrap();
        assert_eq!(printer.address, "192.168.1.80");
        assert_eq!(printer.protocol, Some(Protocol::Cpcl));
        assert!(printer.auto_connect);
        assert!(config.printer(0).is_none());
    }
}
