//! HTTP service with coordinated, deadline-bounded graceful shutdown.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!   SIGINT ──────▶│  lifecycle::signals                              │
//!   SIGTERM ─────▶│  SignalSource ─▶ SignalWatcher ──shutdown(10s)──┐ │
//!                 │                        │                        │ │
//!                 │                 CompletionToken                 ▼ │
//!                 │                        │              http::HttpServer
//!                 │                        ▼               ┌─────────┐ │
//!                 │  lifecycle::startup (main flow) ──────▶│ listener│ │
//!   Client ───────┼───────────────────────────────────────▶│ + conns │ │
//!                 │                                        └─────────┘ │
//!                 │  config · observability · net · resilience         │
//!                 └──────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::Config;
pub use http::HttpServer;
pub use lifecycle::{Lifecycle, SignalSource};
