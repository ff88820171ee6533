use anyhow::Result;
use application::{PrinterApi, Request, Response};
use domain::{PrinterError, PrinterEvent};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Serve JSON-lines requests from `input` until EOF or cancellation.
///
/// Each request line gets exactly one response line; events are written
/// as `{"event": ...}` lines in between.
pub async fn serve<R, W>(
    api: &PrinterApi,
    input: R,
    output: W,
    mut events: broadcast::Receiver<PrinterEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let forward_cancel = cancel.child_token();
    let forwarder = {
        let tx = tx.clone();
        let cancel = forward_cancel.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => {
                        // Flush what was already published
                        while let Ok(event) = events.try_recv() {
                            let _ = tx.send(json!({ "event": event }).to_string());
                        }
                        break;
                    }
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => {
                        let line = json!({ "event": event }).to_string();
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("Request stream closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => api.handle(request).await,
            Err(e) => Response::from(Err::<serde_json::Value, _>(PrinterError::InvalidArgument(
                format!("malformed request: {}", e),
            ))),
        };
        if tx.send(serde_json::to_string(&response)?).is_err() {
            break;
        }
    }

    forward_cancel.cancel();
    let _ = forwarder.await;
    drop(tx);
    writer.await??;
    Ok(())
}
