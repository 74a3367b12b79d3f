//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_decisions_total` (counter): admission outcomes by `decision`
//! - `admission_downstream_faults_total` (counter): panics caught behind the limiter
//! - `admission_tracked_keys` (gauge): keys held in the admission registry
//! - `admission_evicted_keys_total` (counter): keys removed by the idle sweeper
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::security::admission::Decision;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(decision: Decision) {
    counter!("admission_decisions_total", "decision" => decision.as_str()).increment(1);
}

pub fn record_downstream_fault() {
    counter!("admission_downstream_faults_total").increment(1);
}

pub fn record_tracked_keys(keys: usize) {
    gauge!("admission_tracked_keys").set(keys as f64);
}

pub fn record_evicted(keys: usize) {
    counter!("admission_evicted_keys_total").increment(keys as u64);
}
