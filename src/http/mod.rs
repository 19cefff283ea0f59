//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, per-connection timeouts, shutdown)
//!     → middleware/ (request ID, access log, panic recovery)
//!     → health.rs or any other mounted route
//!     → Send to client
//! ```

pub mod health;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{DeadlineCause, HttpServer, ServeError, ServerState, ShutdownError};
