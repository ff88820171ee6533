mod file;
pub mod mock;
mod network;
mod serial;

pub use file::open_spool;
pub use mock::MockTransport;
pub use network::NetworkConfig;
pub use serial::{BluetoothConfig, SerialConfig};

use async_trait::async_trait;
use domain::PrinterError;
use domain::printer::{PrinterStream, TransportKind, TransportProvider};

/// Opens printer channels for every supported transport kind
#[derive(Debug, Clone, Default)]
pub struct TransportFactory {
    serial: SerialConfig,
    bluetooth: BluetoothConfig,
    network: NetworkConfig,
}

impl TransportFactory {
    pub fn new(serial: SerialConfig, bluetooth: BluetoothConfig, network: NetworkConfig) -> Self {
        Self {
            serial,
            bluetooth,
            network,
        }
    }
}

#[async_trait]
impl TransportProvider for TransportFactory {
    fn is_available(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Bluetooth => self.bluetooth.adapter_present(),
            TransportKind::Serial | TransportKind::Network | TransportKind::File => true,
        }
    }

    async fn open(
        &self,
        kind: TransportKind,
        address: &str,
    ) -> Result<PrinterStream, PrinterError> {
        match kind {
            TransportKind::Bluetooth => {
                let node = self.bluetooth.resolve(address).ok_or_else(|| {
                    PrinterError::ConnectFailure(format!(
                        "No RFCOMM binding configured for {}",
                        address
                    ))
                })?;
                self.bluetooth.serial(&self.serial).open(&node)
            }
            TransportKind::Serial => self.serial.open(address),
            TransportKind::Network => self.network.open(address).await,
            TransportKind::File => open_spool(address).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_bluetooth_transports_are_always_available() {
        let factory = TransportFactory::default();
        assert!(factory.is_available(TransportKind::Serial));
        assert!(factory.is_available(TransportKind::Network));
        assert!(factory.is_available(TransportKind::File));
    }

    #[tokio::test]
    async fn test_unbound_bluetooth_address_fails() {
        let factory = TransportFactory::default();
        let result = factory
            .open(TransportKind::Bluetooth, "00:11:22:33:44:55")
            .await;
        match result {
            Err(PrinterError::ConnectFailure(msg)) => assert!(msg.contains("RFCOMM")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("open should fail"),
        }
    }
}
