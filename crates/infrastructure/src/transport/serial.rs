use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use domain::PrinterError;
use domain::printer::PrinterStream;
use serde::{Deserialize, Serialize};
use tokio_serial::SerialPortBuilderExt;

/// Serial line configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: String, // "None", "Even", "Odd"
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_parity() -> String {
    "None".to_string()
}
fn default_stop_bits() -> u8 {
    1
}
fn default_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SerialConfig {
    fn to_parity(&self) -> Result<tokio_serial::Parity, PrinterError> {
        match self.parity.as_str() {
            "None" => Ok(tokio_serial::Parity::None),
            "Even" => Ok(tokio_serial::Parity::Even),
            "Odd" => Ok(tokio_serial::Parity::Odd),
            _ => Err(PrinterError::InvalidArgument(format!(
                "Invalid parity: {}",
                self.parity
            ))),
        }
    }

    fn to_stop_bits(&self) -> Result<tokio_serial::StopBits, PrinterError> {
        match self.stop_bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            _ => Err(PrinterError::InvalidArgument(format!(
                "Invalid stop bits: {}",
                self.stop_bits
            ))),
        }
    }

    fn to_data_bits(&self) -> Result<tokio_serial::DataBits, PrinterError> {
        match self.data_bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            _ => Err(PrinterError::InvalidArgument(format!(
                "Invalid data bits: {}",
                self.data_bits
            ))),
        }
    }

    /// Open `port` and split it into printer stream halves
    pub fn open(&self, port: &str) -> Result<PrinterStream, PrinterError> {
        // COM10 and above need the device namespace prefix on Windows
        let port_name = if cfg!(target_os = "windows") && !port.to_uppercase().starts_with(r"\\.\")
        {
            format!(r"\\.\{}", port)
        } else {
            port.to_string()
        };

        tracing::debug!(
            port = %port_name,
            baud_rate = self.baud_rate,
            "Opening serial port"
        );

        let stream = tokio_serial::new(&port_name, self.baud_rate)
            .data_bits(self.to_data_bits()?)
            .parity(self.to_parity()?)
            .stop_bits(self.to_stop_bits()?)
            .timeout(Duration::from_millis(self.timeout_ms))
            .open_native_async()
            .map_err(|e| {
                tracing::warn!(port = %port_name, error = %e, "Failed to open serial port");
                PrinterError::ConnectFailure(format!(
                    "Cannot open {}: {} (port busy or not permitted?)",
                    port_name, e
                ))
            })?;

        tracing::debug!(port = %port_name, "Serial port opened successfully");
        Ok(PrinterStream::split(stream))
    }
}

/// Bluetooth SPP printers are reached through RFCOMM device nodes
/// (`rfcomm bind`), so the channel itself is a serial port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BluetoothConfig {
    /// MAC address -> RFCOMM device node, e.g. "DC:0D:30:00:12:34" -> "/dev/rfcomm0"
    #[serde(default)]
    pub bindings: HashMap<String, String>,
    #[serde(default = "default_bluetooth_baud_rate")]
    pub baud_rate: u32,
    /// Directory whose entries indicate a present adapter
    #[serde(default = "default_adapter_path")]
    pub adapter_path: PathBuf,
    /// Skip the adapter presence check
    #[serde(default)]
    pub assume_available: bool,
}

fn default_bluetooth_baud_rate() -> u32 {
    115200
}
fn default_adapter_path() -> PathBuf {
    PathBuf::from("/sys/class/bluetooth")
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
            baud_rate: default_bluetooth_baud_rate(),
            adapter_path: default_adapter_path(),
            assume_available: false,
        }
    }
}

impl BluetoothConfig {
    /// Resolve a device address to the node to open. Paths pass through,
    /// MAC addresses are looked up case-insensitively.
    pub fn resolve(&self, address: &str) -> Option<String> {
        if address.starts_with('/') || address.to_uppercase().starts_with("COM") {
            return Some(address.to_string());
        }
        self.bindings
            .iter()
            .find(|(mac, _)| mac.eq_ignore_ascii_case(address))
            .map(|(_, node)| node.clone())
    }

    pub fn adapter_present(&self) -> bool {
        if self.assume_available {
            return true;
        }
        std::fs::read_dir(&self.adapter_path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    pub fn serial(&self, base: &SerialConfig) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud_rate,
            ..base.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, "None");
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.timeout_ms, 1000);
    }

    #[test]
    fn test_serial_config_parity_conversion() {
        let config = SerialConfig {
            parity: "Even".to_string(),
            ..SerialConfig::default()
        };
        assert!(matches!(
            config.to_parity().unwrap(),
            tokio_serial::Parity::Even
        ));

        let config_bad = SerialConfig {
            parity: "Mark".to_string(),
            ..config.clone()
        };
        assert!(config_bad.to_parity().is_err());
    }

    #[test]
    fn test_invalid_framing_is_rejected_before_open() {
        let config = SerialConfig {
            data_bits: 9,
            ..SerialConfig::default()
        };
        assert!(matches!(
            config.open("/dev/null-printer"),
            Err(PrinterError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bluetooth_resolution() {
        let mut config = BluetoothConfig::default();
        config
            .bindings
            .insert("DC:0D:30:00:12:34".to_string(), "/dev/rfcomm0".to_string());

        assert_eq!(
            config.resolve("dc:0d:30:00:12:34").as_deref(),
            Some("/dev/rfcomm0")
        );
        assert_eq!(config.resolve("/dev/rfcomm3").as_deref(), Some("/dev/rfcomm3"));
        assert_eq!(config.resolve("00:11:22:33:44:55"), None);
    }

    #[test]
    fn test_bluetooth_adapter_presence() {
        let missing = BluetoothConfig {
            adapter_path: PathBuf::from("/definitely/not/here"),
            ..BluetoothConfig::default()
        };
        assert!(!missing.adapter_present());

        let forced = BluetoothConfig {
            assume_available: true,
            ..missing
        };
        assert!(forced.adapter_present());
    }
}
