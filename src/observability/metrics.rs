//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_admissions_total` (counter): admission decisions by outcome
//! - `gate_retries_total` (counter): downstream re-invocations
//! - `gate_retry_exhausted_total` (counter): requests answered after the retry budget ran out
//! - `gate_auth_rejections_total` (counter): auth gate rejections by reason
//! - `gate_store_errors_total` (counter): failed counter store calls
//! - `gate_request_duration_seconds` (histogram): end-to-end latency by status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    counter!("gate_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_retry() {
    counter!("gate_retries_total").increment(1);
}

pub fn record_retry_exhausted() {
    counter!("gate_retry_exhausted_total").increment(1);
}

pub fn record_auth_rejection(reason: &'static str) {
    counter!("gate_auth_rejections_total", "reason" => reason).increment(1);
}

pub fn record_store_error() {
    counter!("gate_store_errors_total").increment(1);
}

pub fn record_request(status: u16, start: Instant) {
    histogram!("gate_request_duration_seconds", "status" => status.to_string())
        .record(start.elapsed().as_secs_f64());
}
