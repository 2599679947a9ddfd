//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_attempts_total` (counter): attempts by kind and result
//! - `lifecycle_degradations_total` (counter): recorded failures by reason
//! - `lifecycle_successor_spawns_total` (counter): reboot spawns by result
//! - `lifecycle_attempt_duration_seconds` (histogram): attempt wall time
//! - `http_in_flight_requests` (gauge): requests currently being served

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::{AttemptKind, Outcome};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

/// Record the result of a shutdown or reboot attempt.
pub fn record_outcome(outcome: &Outcome, elapsed: Duration) {
    let kind = outcome.kind().as_str();
    let Some(status) = outcome.status() else {
        counter!("lifecycle_attempts_total", "kind" => kind, "result" => "skipped").increment(1);
        return;
    };

    let result = if status.is_graceful() { "graceful" } else { "degraded" };
    counter!("lifecycle_attempts_total", "kind" => kind, "result" => result).increment(1);
    histogram!("lifecycle_attempt_duration_seconds", "kind" => kind).record(elapsed.as_secs_f64());

    for degradation in status.degradations() {
        counter!("lifecycle_degradations_total", "reason" => degradation.label()).increment(1);
    }

    if outcome.kind() == AttemptKind::Reboot {
        let spawn = if status.successor().is_some() { "started" } else { "failed" };
        counter!("lifecycle_successor_spawns_total", "result" => spawn).increment(1);
    }
}

/// Publish the number of in-flight requests.
pub fn record_in_flight(count: u64) {
    gauge!("http_in_flight_requests").set(count as f64);
}
