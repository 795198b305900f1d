//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fleet_requests_total` (counter): requests by method, status, target
//! - `fleet_request_duration_seconds` (histogram): end-to-end latency
//! - `fleet_in_flight` (gauge): requests currently being served
//! - `fleet_workers_live` / `fleet_workers_expected` (gauge)
//! - `fleet_probe_failures_total` (counter)
//! - `fleet_spawns_total` (counter): by outcome
//! - `fleet_evictions_total` (counter): by reason

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request. `target` is a worker address, or `local`.
pub fn record_request(method: &str, status: u16, target: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("target", target.to_string()),
    ];
    metrics::counter!("fleet_requests_total", &labels).increment(1);
    metrics::histogram!("fleet_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_in_flight(count: usize) {
    metrics::gauge!("fleet_in_flight").set(count as f64);
}

pub fn record_fleet_size(expected: usize, live: usize) {
    metrics::gauge!("fleet_workers_expected").set(expected as f64);
    metrics::gauge!("fleet_workers_live").set(live as f64);
}

/// Unlabelled: worker addresses churn with every spawn. The log line names the worker.
pub fn record_probe_failure() {
    metrics::counter!("fleet_probe_failures_total").increment(1);
}

pub fn record_spawn(outcome: &'static str) {
    metrics::counter!("fleet_spawns_total", "outcome" => outcome).increment(1);
}

pub fn record_eviction(reason: &'static str) {
    metrics::counter!("fleet_evictions_total", "reason" => reason).increment(1);
}
