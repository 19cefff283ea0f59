//! Liveness probe.
//!
//! `GET /ping` reports that the process is up. It performs no dependency
//! checks, so it keeps answering `200` while the rest of the service is
//! degraded.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Path of the liveness probe.
pub const PING_PATH: &str = "/ping";

/// Body returned by the probe.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pong {
    pub pong: bool,
}

pub async fn ping() -> Json<Pong> {
    Json(Pong { pong: true })
}

/// Router exposing the liveness probe.
pub fn routes() -> Router {
    Router::new().route(PING_PATH, get(ping))
}
