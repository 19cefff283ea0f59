//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Path, routing::get, Router};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use graceful_server::config::HttpServerConfig;
use graceful_server::http::{health, middleware, HttpServer};
use graceful_server::lifecycle::{Lifecycle, RunSummary, ShutdownTrigger, SignalSource};

/// A server running under a full lifecycle, driven by a synthetic signal source.
pub struct TestServer {
    pub server: Arc<HttpServer>,
    pub addr: SocketAddr,
    pub trigger: ShutdownTrigger,
    pub run: JoinHandle<RunSummary>,
}

/// Ephemeral port, generous request timeout, default idle timeout.
pub fn config() -> HttpServerConfig {
    HttpServerConfig {
        address: "127.0.0.1:0".to_string(),
        timeout: Duration::from_secs(30),
        ..HttpServerConfig::default()
    }
}

/// Start `/ping` plus `/slow/{millis}` behind the standard middleware.
pub async fn start(config: HttpServerConfig, shutdown_timeout: Duration) -> TestServer {
    let app = middleware::apply(health::routes().merge(slow_routes()));
    let server = Arc::new(HttpServer::new(config, app));
    let (trigger, source) = SignalSource::channel();

    let run = tokio::spawn(
        Lifecycle::new(server.clone(), trigger.clone(), source)
            .shutdown_timeout(shutdown_timeout)
            .run(CancellationToken::new()),
    );

    let addr = tokio::time::timeout(Duration::from_secs(5), server.ready())
        .await
        .expect("server did not start")
        .expect("server did not bind");

    TestServer {
        server,
        addr,
        trigger,
        run,
    }
}

fn slow_routes() -> Router {
    Router::new().route("/slow/{millis}", get(slow))
}

async fn slow(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "done"
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Open a raw connection and send a keep-alive GET for `path`.
pub async fn raw_get(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: keep-alive\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Read until `needle` shows up in the stream, or the peer closes.
pub async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
        if String::from_utf8_lossy(&received).contains(needle) {
            break;
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}

/// Resolves once the peer has closed the connection (EOF or reset).
pub async fn wait_for_close(stream: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

/// Poll until the server reports `expected` live connections.
pub async fn wait_for_connections(server: &HttpServer, expected: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.active_connections() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection count never settled");
}
