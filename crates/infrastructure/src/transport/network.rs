use std::time::Duration;

use domain::PrinterError;
use domain::printer::PrinterStream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::info;

/// Raw TCP ("JetDirect") printer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port used when the address has none
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_port() -> u16 {
    9100
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    /// `host` or `host:port`; bracketed IPv6 literals keep their port
    pub fn socket_address(&self, address: &str) -> String {
        let has_port = match address.rsplit_once(':') {
            Some((host, port)) => {
                port.parse::<u16>().is_ok() && (!host.contains(':') || host.ends_with(']'))
            }
            None => false,
        };
        if has_port {
            address.to_string()
        } else {
            format!("{}:{}", address, self.port)
        }
    }

    pub async fn open(&self, address: &str) -> Result<PrinterStream, PrinterError> {
        let target = self.socket_address(address);
        let timeout = Duration::from_millis(self.connect_timeout_ms);

        info!("Connecting to printer at {}", target);
        match tokio::time::timeout(timeout, TcpStream::connect(&target)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                info!("Connected to printer at {}", target);
                Ok(PrinterStream::split(stream))
            }
            Ok(Err(e)) => Err(PrinterError::ConnectFailure(e.to_string())),
            Err(_) => Err(PrinterError::ConnectFailure(
                "Connection timed out".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_address_defaults_port() {
        let config = NetworkConfig::default();
        assert_eq!(config.socket_address("192.168.1.50"), "192.168.1.50:9100");
        assert_eq!(config.socket_address("printer.local:6101"), "printer.local:6101");
        assert_eq!(config.socket_address("[::1]:9100"), "[::1]:9100");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = NetworkConfig::default().open(&address).await;
        assert!(matches!(result, Err(PrinterError::ConnectFailure(_))));
    }
}
