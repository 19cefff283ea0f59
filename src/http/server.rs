//! HTTP server lifecycle.
//!
//! # Responsibilities
//! - Own the listening socket and the accept loop
//! - Serve each connection over HTTP/1.1 with read, write and idle timeouts
//! - Drain in-flight requests on shutdown, force-close at the deadline
//!
//! # State Machine
//! ```text
//! Created ──listen_and_serve──▶ Serving ──shutdown──▶ ShuttingDown ──▶ Stopped
//!    │                                                                   ▲
//!    └────────────────────────────shutdown───────────────────────────────┘
//! ```
//!
//! `listen_and_serve` returns [`ServeError::ServerClosed`] once the server has
//! reached `Stopped`. That value marks a coordinated shutdown, not a failure.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tower::ServiceExt;
use tower_http::timeout::TimeoutLayer;
use tracing::Instrument;

use crate::config::HttpServerConfig;
use crate::net::connection::{ConnectionState, ConnectionTracker, RequestActivity};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Backoff bounds for transient accept failures.
const ACCEPT_BACKOFF_BASE_MS: u64 = 5;
const ACCEPT_BACKOFF_MAX_MS: u64 = 1_000;

/// Lifecycle state of an [`HttpServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, not yet listening.
    Created,
    /// Accepting and serving connections.
    Serving,
    /// No longer accepting; waiting for in-flight requests.
    ShuttingDown,
    /// Every connection is gone. Terminal.
    Stopped,
}

/// Why `listen_and_serve` returned.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Shutdown completed. Expected outcome, not a failure.
    #[error("http: Server closed")]
    ServerClosed,

    /// `listen_and_serve` was already called on this server.
    #[error("server is already serving")]
    AlreadyStarted,

    /// Binding or accepting failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

impl ServeError {
    /// Whether this is the coordinated-shutdown sentinel rather than a failure.
    pub fn is_server_closed(&self) -> bool {
        matches!(self, ServeError::ServerClosed)
    }
}

/// What ended the drain wait passed to [`HttpServer::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineCause {
    /// The time budget ran out.
    Elapsed,
    /// The caller's context was cancelled before the budget ran out.
    Cancelled,
}

/// Shutdown did not drain cleanly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    /// The deadline passed with connections still open; they were closed forcibly.
    #[error("context deadline exceeded: {remaining} connection(s) force-closed")]
    DeadlineExceeded { remaining: u64 },

    /// The context was cancelled with connections still open; they were closed forcibly.
    #[error("context canceled: {remaining} connection(s) force-closed")]
    Cancelled { remaining: u64 },
}

impl ShutdownError {
    /// Connections that were still open when they were force-closed.
    pub fn remaining(&self) -> u64 {
        match self {
            ShutdownError::DeadlineExceeded { remaining }
            | ShutdownError::Cancelled { remaining } => *remaining,
        }
    }
}

/// HTTP server with graceful, deadline-bounded shutdown.
///
/// Shared behind an `Arc`: one task drives [`listen_and_serve`](Self::listen_and_serve),
/// another calls [`shutdown`](Self::shutdown).
pub struct HttpServer {
    config: HttpServerConfig,
    app: Router,
    started: AtomicBool,
    state: watch::Sender<ServerState>,
    phase: watch::Sender<ConnectionState>,
    connections: ConnectionTracker,
    local_addr: OnceLock<SocketAddr>,
}

impl HttpServer {
    /// Create a server for `app`. The write timeout is applied here.
    pub fn new(config: HttpServerConfig, app: Router) -> Self {
        let app = app.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.timeout,
        ));
        let (state, _) = watch::channel(ServerState::Created);
        let (phase, _) = watch::channel(ConnectionState::Active);

        Self {
            config,
            app,
            started: AtomicBool::new(false),
            state,
            phase,
            connections: ConnectionTracker::new(),
            local_addr: OnceLock::new(),
        }
    }

    /// Bind the configured address and serve until shutdown completes.
    ///
    /// Never returns `Ok`. After a coordinated shutdown the error is
    /// [`ServeError::ServerClosed`]; anything else is an operational failure.
    /// Calling this after `shutdown` yields `ServerClosed` without binding.
    pub async fn listen_and_serve(&self) -> Result<Infallible, ServeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServeError::AlreadyStarted);
        }
        if self.state() != ServerState::Created {
            return Err(ServeError::ServerClosed);
        }

        let listener = Listener::bind(&self.config.address, self.config.max_connections).await?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: self.config.address.clone(),
            source,
        })?;
        let _ = self.local_addr.set(local_addr);

        // Shutdown may have run while we were binding.
        let serving = self.state.send_if_modified(|state| {
            if *state == ServerState::Created {
                *state = ServerState::Serving;
                true
            } else {
                false
            }
        });
        if !serving {
            return Err(ServeError::ServerClosed);
        }

        tracing::info!(
            address = %local_addr,
            read_timeout = ?self.config.timeout,
            write_timeout = ?self.config.timeout,
            idle_timeout = ?self.config.idle_timeout,
            "HTTP server listening"
        );

        self.accept_loop(listener).await?;

        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
        Err(ServeError::ServerClosed)
    }

    /// Stop accepting, drain connections, and force-close whatever is left
    /// when `deadline` completes.
    ///
    /// Returns [`ShutdownError::DeadlineExceeded`] or [`ShutdownError::Cancelled`],
    /// according to the [`DeadlineCause`] the deadline resolves with, if
    /// connections had to be closed forcibly. Either way the server ends up
    /// `Stopped`. Forced close does not wait for connection tasks to unwind,
    /// so this returns as soon as the deadline fires.
    pub async fn shutdown<F>(&self, deadline: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = DeadlineCause>,
    {
        let mut previous = ServerState::Created;
        self.state.send_if_modified(|state| {
            previous = *state;
            match *state {
                ServerState::Created => {
                    *state = ServerState::Stopped;
                    true
                }
                ServerState::Serving => {
                    *state = ServerState::ShuttingDown;
                    true
                }
                ServerState::ShuttingDown | ServerState::Stopped => false,
            }
        });

        match previous {
            ServerState::Created => {
                self.phase.send_replace(ConnectionState::Closed);
                tracing::debug!("HTTP server stopped before it started serving");
                return Ok(());
            }
            ServerState::ShuttingDown | ServerState::Stopped => {
                let mut state = self.state.subscribe();
                let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
                return Ok(());
            }
            ServerState::Serving => {}
        }

        self.phase.send_replace(ConnectionState::Draining);
        tracing::info!(
            active_connections = self.connections.active_count(),
            "Draining connections"
        );

        tokio::pin!(deadline);
        let result = tokio::select! {
            biased;
            _ = self.connections.wait_for_shutdown() => Ok(()),
            cause = &mut deadline => {
                let remaining = self.connections.active_count();
                tracing::warn!(remaining, ?cause, "Shutdown cut short, closing connections");
                match cause {
                    DeadlineCause::Elapsed => Err(ShutdownError::DeadlineExceeded { remaining }),
                    DeadlineCause::Cancelled => Err(ShutdownError::Cancelled { remaining }),
                }
            }
        };

        self.phase.send_replace(ConnectionState::Closed);
        self.state.send_replace(ServerState::Stopped);
        metrics::record_shutdown(match &result {
            Ok(()) => "graceful",
            Err(ShutdownError::DeadlineExceeded { .. }) => "deadline",
            Err(ShutdownError::Cancelled { .. }) => "cancelled",
        });

        result
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Wait until the server is listening (or past it) and return its address.
    ///
    /// Returns `None` if the server stopped without ever binding.
    pub async fn ready(&self) -> Option<SocketAddr> {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s != ServerState::Created).await;
        self.local_addr()
    }

    /// Address actually bound, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Number of open client connections.
    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }

    /// Accept until the connection phase leaves `Active`.
    async fn accept_loop(&self, listener: Listener) -> Result<(), ListenerError> {
        let mut phase = self.phase.subscribe();
        let mut failures = 0u32;

        loop {
            if *phase.borrow_and_update() != ConnectionState::Active {
                tracing::debug!("Listener closed");
                return Ok(());
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        failures = 0;
                        self.spawn_connection(stream, peer, permit);
                    }
                    Err(e) if e.is_transient() => {
                        failures = failures.saturating_add(1);
                        let delay = calculate_backoff(failures, ACCEPT_BACKOFF_BASE_MS, ACCEPT_BACKOFF_MAX_MS);
                        tracing::warn!(error = %e, retry_in = ?delay, "Accept failed, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = phase.changed() => {}
                        }
                    }
                    Err(e) => return Err(e),
                },
                _ = phase.changed() => {}
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.connections.track();
        let span = tracing::debug_span!("connection", id = %guard.id(), peer = %peer);
        let connection = Connection {
            app: self.app.clone(),
            peer,
            read_timeout: self.config.timeout,
            idle_timeout: self.config.idle_timeout,
            phase: self.phase.subscribe(),
        };

        tokio::spawn(
            async move {
                connection.serve(stream).await;
                drop(permit);
                drop(guard);
            }
            .instrument(span),
        );
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("address", &self.config.address)
            .field("state", &self.state())
            .field("active_connections", &self.active_connections())
            .finish()
    }
}

/// One accepted client connection.
struct Connection {
    app: Router,
    peer: SocketAddr,
    read_timeout: Duration,
    idle_timeout: Duration,
    phase: watch::Receiver<ConnectionState>,
}

impl Connection {
    /// Serve HTTP/1.1 on `stream` until the client leaves, the connection
    /// idles out, or the server asks it to drain or close.
    async fn serve(mut self, stream: TcpStream) {
        let activity = RequestActivity::new();
        let mut requests = activity.subscribe();

        let app = self.app.clone();
        let peer = self.peer;
        let service = {
            let activity = activity.clone();
            service_fn(move |mut request: Request<Incoming>| {
                let in_flight = activity.begin();
                request.extensions_mut().insert(ConnectInfo(peer));
                let app = app.clone();
                async move {
                    let response = app.oneshot(request).await;
                    drop(in_flight);
                    response
                }
            })
        };

        let conn = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_timeout)
            .keep_alive(true)
            .serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let mut closing = false;
        loop {
            match *self.phase.borrow_and_update() {
                ConnectionState::Closed => {
                    tracing::debug!("Forcing connection closed");
                    return;
                }
                ConnectionState::Draining if !closing => {
                    closing = true;
                    conn.as_mut().graceful_shutdown();
                }
                _ => {}
            }
            let idle = *requests.borrow_and_update() == 0;

            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(error = %e, "Connection ended with error");
                    }
                    return;
                }
                changed = self.phase.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = requests.changed() => {}
                _ = tokio::time::sleep(self.idle_timeout), if idle && !closing => {
                    tracing::debug!(idle_timeout = ?self.idle_timeout, "Closing idle connection");
                    closing = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::health;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_config() -> HttpServerConfig {
        HttpServerConfig {
            address: "127.0.0.1:0".to_string(),
            ..HttpServerConfig::default()
        }
    }

    #[test]
    fn server_closed_is_the_only_sentinel() {
        assert!(ServeError::ServerClosed.is_server_closed());
        assert!(!ServeError::AlreadyStarted.is_server_closed());
        let bind = ServeError::from(ListenerError::Bind {
            address: "x:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        });
        assert!(!bind.is_server_closed());
    }

    #[tokio::test]
    async fn shutdown_before_serving_stops_immediately() {
        let server = HttpServer::new(test_config(), health::routes());
        assert_eq!(server.state(), ServerState::Created);

        server.shutdown(std::future::pending()).await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);

        let err = server.listen_and_serve().await.unwrap_err();
        assert!(err.is_server_closed());
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn serves_until_shutdown_then_reports_closed() {
        let server = std::sync::Arc::new(HttpServer::new(test_config(), health::routes()));
        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.listen_and_serve().await })
        };

        let addr = server.ready().await.expect("server should bind");
        assert_ne!(addr.port(), 0);
        assert_eq!(server.state(), ServerState::Serving);

        server
            .shutdown(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                DeadlineCause::Elapsed
            })
            .await
            .unwrap();
        assert_eq!(server.state(), ServerState::Stopped);

        let err = serving.await.unwrap().unwrap_err();
        assert!(err.is_server_closed());
    }

    #[tokio::test]
    async fn second_listen_is_rejected() {
        let server = std::sync::Arc::new(HttpServer::new(test_config(), health::routes()));
        let first = {
            let server = server.clone();
            tokio::spawn(async move { server.listen_and_serve().await })
        };
        server.ready().await.unwrap();

        let err = server.listen_and_serve().await.unwrap_err();
        assert!(matches!(err, ServeError::AlreadyStarted));

        server.shutdown(std::future::ready(DeadlineCause::Elapsed)).await.unwrap();
        assert!(first.await.unwrap().unwrap_err().is_server_closed());
    }

    #[tokio::test]
    async fn bind_failure_is_a_listener_error() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = HttpServerConfig {
            address: occupied.local_addr().unwrap().to_string(),
            ..HttpServerConfig::default()
        };
        let server = HttpServer::new(config, health::routes());

        let err = server.listen_and_serve().await.unwrap_err();
        assert!(matches!(err, ServeError::Listener(ListenerError::Bind { .. })));
        assert_eq!(server.state(), ServerState::Created);

        server.shutdown(std::future::pending()).await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn forced_close_returns_when_the_deadline_fires() {
        let app = Router::new().route(
            "/stall",
            axum::routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let config = HttpServerConfig {
            timeout: Duration::from_secs(60),
            ..test_config()
        };
        let server = std::sync::Arc::new(HttpServer::new(config, app));
        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.listen_and_serve().await })
        };
        let addr = server.ready().await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /stall HTTP/1.1\r\nhost: localhost\r\n\r\n")
            .await
            .unwrap();
        while server.active_connections() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let start = std::time::Instant::now();
        let result = server
            .shutdown(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                DeadlineCause::Elapsed
            })
            .await;

        assert_eq!(result, Err(ShutdownError::DeadlineExceeded { remaining: 1 }));
        assert!(start.elapsed() < Duration::from_millis(200), "{:?}", start.elapsed());
        assert_eq!(server.state(), ServerState::Stopped);

        let mut buf = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(1), stream.read_to_end(&mut buf)).await;
        assert!(read.is_ok(), "force-closed connection should reach EOF");
        assert!(serving.await.unwrap().unwrap_err().is_server_closed());
    }

    #[tokio::test]
    async fn cancellation_with_nothing_to_drain_is_clean() {
        let server = HttpServer::new(test_config(), health::routes());
        let serving = server.listen_and_serve();
        tokio::pin!(serving);
        tokio::select! {
            _ = &mut serving => panic!("serving ended early"),
            _ = server.ready() => {}
        }

        let result = server.shutdown(std::future::ready(DeadlineCause::Cancelled)).await;
        assert_eq!(result, Ok(()), "nothing to drain means nothing was cut short");
        assert!(serving.await.unwrap_err().is_server_closed());
    }

    #[test]
    fn shutdown_errors_carry_the_force_closed_count() {
        assert_eq!(ShutdownError::DeadlineExceeded { remaining: 2 }.remaining(), 2);
        let cancelled = ShutdownError::Cancelled { remaining: 3 };
        assert_eq!(cancelled.remaining(), 3);
        assert!(cancelled.to_string().starts_with("context canceled"));
    }

    #[tokio::test]
    async fn repeated_shutdown_is_harmless() {
        let server = HttpServer::new(test_config(), health::routes());
        server.shutdown(std::future::ready(DeadlineCause::Elapsed)).await.unwrap();
        server.shutdown(std::future::ready(DeadlineCause::Elapsed)).await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
