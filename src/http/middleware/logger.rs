//! Per-request access logging.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::http::request::RequestIdExt;
use crate::observability::metrics;

/// Log one line per completed request and record request metrics.
pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let span = tracing::info_span!(
        "request",
        method = %method,
        path = %path,
        request_id = %request_id,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    let bytes = response.body().size_hint().exact();
    tracing::info!(
        parent: &span,
        remote_addr = %remote_addr,
        user_agent = %user_agent,
        status = status.as_u16(),
        bytes = ?bytes,
        duration = ?start.elapsed(),
        "request completed"
    );
    metrics::record_request(method.as_str(), status.as_u16(), start);

    response
}
