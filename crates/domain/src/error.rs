use thiserror::Error;

/// Printer-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrinterError {
    #[error("No adapter or transport available: {0}")]
    Unavailable(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection failed: {0}")]
    ConnectFailure(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Task failed: {0}")]
    TaskFailure(String),
}

impl PrinterError {
    /// Stable code reported across the request/response boundary
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "bluetooth_unavailable",
            Self::NotConnected => "not_connected",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::ConnectFailure(_) => "connect_failure",
            Self::WriteFailed(_) | Self::TaskFailure(_) => "task_failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, PrinterError>;
