use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use domain::PrinterError;
use domain::printer::{PrinterStream, TransportKind, TransportProvider};
use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};

/// In-memory transport that records every byte written to it.
///
/// Clones share state, so a test keeps one clone and hands another to the
/// code under test.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    written: Mutex<Vec<u8>>,
    writes: Mutex<Vec<Vec<u8>>>,
    journal: Mutex<Vec<String>>,
    device: tokio::sync::Mutex<Option<DuplexStream>>,
    panic_marker: Mutex<Option<Vec<u8>>>,
    opened: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    fail_opens: AtomicUsize,
    fail_writes: AtomicUsize,
    hang_open: AtomicBool,
    hang_writes: AtomicBool,
    unavailable: AtomicBool,
}

impl MockState {
    fn log(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn released(&self) {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
        self.log("close".to_string());
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All bytes written, across every stream
    pub fn written(&self) -> Vec<u8> {
        self.state.written.lock().unwrap().clone()
    }

    /// Individual write calls, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.writes.lock().unwrap().clone()
    }

    /// "open <address>" / "close" / "write <n>" entries, in order
    pub fn journal(&self) -> Vec<String> {
        self.state.journal.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn currently_open(&self) -> usize {
        self.state.open_now.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open streams seen
    pub fn max_concurrent_open(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.state.fail_opens.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.state.fail_writes.store(count, Ordering::SeqCst);
    }

    /// Make open() never complete
    pub fn hang_opens(&self, hang: bool) {
        self.state.hang_open.store(hang, Ordering::SeqCst);
    }

    /// Make writes stay pending forever
    pub fn hang_writes(&self, hang: bool) {
        self.state.hang_writes.store(hang, Ordering::SeqCst);
    }

    pub fn set_available(&self, available: bool) {
        self.state.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Panic inside the writer when a write contains `marker`
    pub fn panic_on(&self, marker: &[u8]) {
        *self.state.panic_marker.lock().unwrap() = Some(marker.to_vec());
    }

    /// Push status bytes from the device side of the current stream
    pub async fn device_send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut device = self.state.device.lock().await;
        match device.as_mut() {
            Some(stream) => stream.write_all(bytes).await,
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no open stream")),
        }
    }

    /// Drop the device side; the reader sees EOF
    pub async fn device_hangup(&self) {
        self.state.device.lock().await.take();
    }
}

#[async_trait]
impl TransportProvider for MockTransport {
    fn is_available(&self, _kind: TransportKind) -> bool {
        !self.state.unavailable.load(Ordering::SeqCst)
    }

    async fn open(
        &self,
        _kind: TransportKind,
        address: &str,
    ) -> Result<PrinterStream, PrinterError> {
        let state = &self.state;
        state.log(format!("open {}", address));

        if state.hang_open.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let should_fail = state
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PrinterError::ConnectFailure(format!(
                "Simulated connection failure to {}",
                address
            )));
        }

        state.opened.fetch_add(1, Ordering::SeqCst);
        let now = state.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_open.fetch_max(now, Ordering::SeqCst);

        let (host, device) = tokio::io::duplex(1024);
        *state.device.lock().await = Some(device);

        let writer = MockWriter {
            state: self.state.clone(),
            released: false,
        };
        Ok(PrinterStream::new(Box::new(writer), Box::new(host)))
    }
}

struct MockWriter {
    state: Arc<MockState>,
    released: bool,
}

impl AsyncWrite for MockWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.released {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream closed",
            )));
        }
        if self.state.hang_writes.load(Ordering::SeqCst) {
            return Poll::Pending;
        }

        let should_fail = self
            .state
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            self.release();
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "Simulated write failure",
            )));
        }

        let marker = self.state.panic_marker.lock().unwrap().clone();
        if let Some(marker) = marker {
            if buf.windows(marker.len()).any(|w| w == marker.as_slice()) {
                panic!("mock transport asked to panic on marker");
            }
        }

        self.state.written.lock().unwrap().extend_from_slice(buf);
        self.state.writes.lock().unwrap().push(buf.to_vec());
        self.state.log(format!("write {}", buf.len()));
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.release();
        Poll::Ready(Ok(()))
    }
}

impl MockWriter {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state.released();
        }
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_mock_records_writes_and_closes() {
        let transport = MockTransport::new();
        let mut stream = transport
            .open(TransportKind::Bluetooth, "AA:BB")
            .await
            .unwrap();

        stream.writer.write_all(b"abc").await.unwrap();
        assert_eq!(transport.written(), b"abc");
        assert_eq!(transport.currently_open(), 1);

        stream.writer.shutdown().await.unwrap();
        drop(stream);
        assert_eq!(transport.currently_open(), 0);
        assert_eq!(transport.journal(), vec!["open AA:BB", "write 3", "close"]);
    }

    #[tokio::test]
    async fn test_mock_failures_are_counted_down() {
        let transport = MockTransport::new();
        transport.fail_next_opens(1);

        assert!(transport.open(TransportKind::Serial, "x").await.is_err());
        assert!(transport.open(TransportKind::Serial, "x").await.is_ok());
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_device_side_feeds_reader() {
        let transport = MockTransport::new();
        let stream = transport.open(TransportKind::Serial, "x").await.unwrap();
        let mut reader = stream.reader.unwrap();

        transport.device_send(&[0x12, 0x00]).await.unwrap();
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x12, 0x00]);

        transport.device_hangup().await;
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }
}
