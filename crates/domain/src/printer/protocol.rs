use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PrinterError;

/// Printer command dialect, fixed per connected device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// ESC/POS receipt printers
    #[default]
    #[serde(alias = "esc", alias = "esc_pos")]
    EscPos,
    /// TSC / TSPL label printers
    #[serde(alias = "tspl")]
    Tsc,
    /// CPCL mobile label printers
    Cpcl,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscPos => "escpos",
            Self::Tsc => "tsc",
            Self::Cpcl => "cpcl",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = PrinterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "escpos" | "esc" | "esc_pos" => Ok(Self::EscPos),
            "tsc" | "tspl" => Ok(Self::Tsc),
            "cpcl" => Ok(Self::Cpcl),
            other => Err(PrinterError::InvalidArgument(format!(
                "unknown protocol '{}'",
                other
            ))),
        }
    }
}

/// How the channel to a printer is established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Bluetooth SPP through an RFCOMM device node
    #[default]
    Bluetooth,
    /// Local serial port
    Serial,
    /// Raw TCP socket (port 9100)
    #[serde(alias = "tcp")]
    Network,
    /// Spool file or network share
    File,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bluetooth => "bluetooth",
            Self::Serial => "serial",
            Self::Network => "network",
            Self::File => "file",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = PrinterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bluetooth" => Ok(Self::Bluetooth),
            "serial" => Ok(Self::Serial),
            "network" | "tcp" => Ok(Self::Network),
            "file" => Ok(Self::File),
            other => Err(PrinterError::InvalidArgument(format!(
                "unknown transport '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_as_str() {
        assert_eq!(Protocol::EscPos.as_str(), "escpos");
        assert_eq!(Protocol::Tsc.as_str(), "tsc");
        assert_eq!(Protocol::Cpcl.as_str(), "cpcl");
    }

    #[test]
    fn test_protocol_aliases() {
        assert_eq!("ESC".parse::<Protocol>().unwrap(), Protocol::EscPos);
        assert_eq!("tspl".parse::<Protocol>().unwrap(), Protocol::Tsc);
        assert!("zpl".parse::<Protocol>().is_err());

        let parsed: Protocol = serde_json::from_str("\"esc\"").unwrap();
        assert_eq!(parsed, Protocol::EscPos);
    }

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!(
            "tcp".parse::<TransportKind>().unwrap(),
            TransportKind::Network
        );
        let parsed: TransportKind = serde_json::from_str("\"serial\"").unwrap();
        assert_eq!(parsed, TransportKind::Serial);
        assert_eq!(TransportKind::default(), TransportKind::Bluetooth);
    }
}
