use std::path::Path;

use domain::PrinterError;
use domain::printer::PrinterStream;
use tokio::fs::OpenOptions;
use tracing::{error, info};

/// Open a spool file or share path for appending. Files have no status
/// channel so the stream is write-only.
pub async fn open_spool(path: &str) -> Result<PrinterStream, PrinterError> {
    info!("Preparing to print to file/share: {:?}", path);

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(PrinterError::ConnectFailure(format!(
                "Directory {:?} does not exist",
                parent
            )));
        }
    }

    match OpenOptions::new()
        .create(true) // Create if not exists (local files)
        .append(true)
        .open(path)
        .await
    {
        Ok(file) => Ok(PrinterStream::write_only(Box::new(file))),
        Err(e) => {
            error!("Failed to open printer file {:?}: {}", path, e);
            Err(PrinterError::ConnectFailure(e.to_string()))
        }
    }
}
