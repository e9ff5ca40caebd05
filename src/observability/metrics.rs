//! Metrics collection and exposition.
//!
//! # Metrics
//! - `json_rest_requests_total` (counter): replies by route and status
//! - `json_rest_request_duration_seconds` (histogram): pipeline latency
//! - `json_rest_failures_total` (counter): failures by error kind
//! - `json_rest_registry_reloads_total` (counter): route/action reloads
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Route label is the registered path, or "none" for unknown paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ErrorKind;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed exchange.
pub fn record_request(route: &str, status: u16, start: Instant) {
    let route = route.to_string();
    counter!(
        "json_rest_requests_total",
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("json_rest_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_failure(kind: ErrorKind) {
    counter!("json_rest_failures_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_reload(what: &'static str) {
    counter!("json_rest_registry_reloads_total", "registry" => what).increment(1);
}
