//! Metrics collection and exposition.
//!
//! # Metrics
//! - `core_starts_total` (counter): start attempts that reached the spawn stage or failed before it
//! - `core_start_failures_total` (counter): failed starts by error code
//! - `core_exits_total` (counter): process exits by outcome (requested/clean/failed)
//! - `core_restarts_total` (counter): automatic restarts fired
//! - `system_proxy_failures_total` (counter): OS proxy write failures by operation
//! - `core_running` (gauge): 1 while a core is owned and running
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Exporter is opt-in via `observability.metrics_enabled`

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_start_attempt() {
    metrics::counter!("core_starts_total").increment(1);
}

pub fn record_start_failure(code: &'static str) {
    metrics::counter!("core_start_failures_total", "code" => code).increment(1);
}

pub fn record_exit(outcome: &'static str) {
    metrics::counter!("core_exits_total", "outcome" => outcome).increment(1);
}

pub fn record_restart() {
    metrics::counter!("core_restarts_total").increment(1);
}

pub fn record_system_proxy_failure(operation: &'static str) {
    metrics::counter!("system_proxy_failures_total", "operation" => operation).increment(1);
}

pub fn set_core_running(running: bool) {
    metrics::gauge!("core_running").set(if running { 1.0 } else { 0.0 });
}
