//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_rpc_calls_total` (counter): RPC calls by method, outcome
//! - `gateway_rpc_call_duration_seconds` (histogram): RPC latency
//! - `gateway_donations_total` (counter): donations by outcome
//! - `gateway_donation_amount` (histogram): donated amounts (UI units)
//! - `gateway_chain_healthy` (gauge): 1=reachable, 0=unreachable
//! - `gateway_leaderboard_scan_duration_seconds` (histogram)
//! - `gateway_leaderboard_donors` (gauge): donors in latest snapshot
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations under the hood)
//! - The exporter binds its own address, separate from the API

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one RPC call.
pub fn record_rpc_call(method: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!("gateway_rpc_calls_total", "method" => method, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("gateway_rpc_call_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

/// Record a donation attempt outcome.
pub fn record_donation(outcome: &'static str, ui_amount: f64) {
    metrics::counter!("gateway_donations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_donation_amount").record(ui_amount);
}

/// Record chain reachability.
pub fn record_chain_health(healthy: bool) {
    metrics::gauge!("gateway_chain_healthy").set(if healthy { 1.0 } else { 0.0 });
}

/// Record a completed leaderboard scan.
pub fn record_scan(donors: usize, start: Instant) {
    metrics::histogram!("gateway_leaderboard_scan_duration_seconds")
        .record(start.elapsed().as_secs_f64());
    metrics::gauge!("gateway_leaderboard_donors").set(donors as f64);
}

/// Record the size of the published leaderboard snapshot.
pub fn record_cache_entries(entries: usize) {
    metrics::gauge!("gateway_leaderboard_cache_entries").set(entries as f64);
}
