use domain::printer::TransportProvider;
use domain::{PrinterError, TransportKind};
use infrastructure::TransportFactory;
use infrastructure::transport::NetworkConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// --- Spool file ---

#[tokio::test]
async fn test_spool_file_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spool.prn");
    let path = path.to_str().unwrap();
    let factory = TransportFactory::default();

    for chunk in [&b"first"[..], &b"second"[..]] {
        let mut stream = factory.open(TransportKind::File, path).await.unwrap();
        assert!(stream.reader.is_none());
        stream.writer.write_all(chunk).await.unwrap();
        stream.writer.shutdown().await.unwrap();
    }

    assert_eq!(std::fs::read(path).unwrap(), b"firstsecond");
}

#[tokio::test]
async fn test_spool_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("spool.prn");
    let factory = TransportFactory::default();

    let result = factory
        .open(TransportKind::File, path.to_str().unwrap())
        .await;
    assert!(matches!(result, Err(PrinterError::ConnectFailure(_))));
}

// --- Raw TCP ---

#[tokio::test]
async fn test_network_stream_is_bidirectional() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let printer = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = [0u8; 4];
        socket.read_exact(&mut received).await.unwrap();
        // DLE EOT style status reply
        socket.write_all(&[0x12]).await.unwrap();
        received
    });

    let network = NetworkConfig {
        port,
        ..NetworkConfig::default()
    };
    let factory = TransportFactory::new(Default::default(), Default::default(), network);
    let mut stream = factory
        .open(TransportKind::Network, "127.0.0.1")
        .await
        .unwrap();

    stream.writer.write_all(&[0x1B, 0x40, b'O', b'K']).await.unwrap();
    stream.writer.flush().await.unwrap();

    let mut status = [0u8; 1];
    stream.reader.as_mut().unwrap().read_exact(&mut status).await.unwrap();
    assert_eq!(status, [0x12]);
    assert_eq!(printer.await.unwrap(), [0x1B, 0x40, b'O', b'K']);
}
