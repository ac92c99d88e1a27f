use std::fs;
use std::time::Duration;

use lantern::config::Config;
use lantern::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn config(root: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.server.listen_addr = "127.0.0.1:0".to_string();
    cfg.server.workers = 2;
    cfg.server.queue_depth = 4;
    cfg.server.shutdown_grace_ms = 500;
    cfg.static_files.root = root.to_path_buf();
    cfg
}

async fn fetch(addr: std::net::SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut out = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut out))
        .await
        .unwrap()
        .unwrap();
    out
}

#[tokio::test]
async fn test_server_serves_and_drains() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "hello world").unwrap();
    let cfg = config(dir.path());

    let server = Server::from_config(&cfg).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let health = fetch(addr, "GET /health HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(health.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(health.ends_with("ok\n"));

    let index = fetch(addr, "GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(index.contains("Content-Length: 11\r\n"));
    assert!(index.ends_with("hello world"));

    let missing = fetch(addr, "GET /nope HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found\r\n"));

    // An idle keep-alive client is closed by the drain.
    let mut idle = TcpStream::connect(addr).await.unwrap();
    idle.write_all(b"GET /health HTTP/1.1\r\n\r\n").await.unwrap();
    let mut buf = [0u8; 512];
    let n = idle.read(&mut buf).await.unwrap();
    assert!(n > 0);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let mut rest = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), idle.read_to_end(&mut rest)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_server_rejects_missing_document_root() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir.path().join("does-not-exist"));

    assert!(Server::from_config(&cfg).await.is_err());
}
