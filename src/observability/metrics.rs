//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): finished requests by outcome
//! - `proxy_cache_hits_total` / `proxy_cache_misses_total` (counters)
//! - `proxy_cache_inserts_total` / `proxy_cache_evictions_total` (counters)
//! - `proxy_upstream_errors_total` (counter)
//! - `proxy_response_bytes_total` (counter): bytes written to clients
//! - `proxy_active_connections` (gauge)

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    counter!("proxy_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_hit() {
    counter!("proxy_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("proxy_cache_misses_total").increment(1);
}

pub fn record_cache_insert() {
    counter!("proxy_cache_inserts_total").increment(1);
}

pub fn record_cache_eviction() {
    counter!("proxy_cache_evictions_total").increment(1);
}

pub fn record_upstream_error() {
    counter!("proxy_upstream_errors_total").increment(1);
}

pub fn record_response_bytes(bytes: u64) {
    counter!("proxy_response_bytes_total").increment(bytes);
}

pub fn set_active_connections(count: u64) {
    gauge!("proxy_active_connections").set(count as f64);
}
