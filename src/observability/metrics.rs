//! Metrics collection and exposition.
//!
//! # Metrics
//! - `server_active_connections` (gauge): live client connections
//! - `server_requests_total` (counter): requests by method and status
//! - `server_request_duration_seconds` (histogram): latency distribution
//! - `server_shutdowns_total` (counter): shutdown attempts by outcome
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("server_active_connections").set(count as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "server_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "server_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_shutdown(outcome: &'static str) {
    metrics::counter!("server_shutdowns_total", "outcome" => outcome).increment(1);
}
