//! Prometheus exposition for the dispatch path.
//!
//! Fleet-facing gauges and counters under the `rondo_` namespace; the
//! per-backend aggregates served on `/admin/metrics` live in
//! [`crate::metrics`]. Everything here is keyed the way operators page
//! on it: which backend, which breaker state, how often selection came
//! up empty.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Failure to install is reported and the proxy keeps running without
/// exposition.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(error) => {
            tracing::error!(error = %error, "Failed to install Prometheus exporter")
        }
    }
}

/// Record one completed forward, successful or not.
pub fn record_forward(method: &str, status: u16, backend: &str, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];

    counter!("rondo_forwards_total", &labels).increment(1);
    histogram!("rondo_forward_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Count a request that found no backend healthy and admitted.
pub fn record_no_backend_available() {
    counter!("rondo_no_backend_total").increment(1);
}

/// Update the per-backend health gauge after a probe.
pub fn record_backend_health(backend: &str, healthy: bool) {
    let value = if healthy { 1.0 } else { 0.0 };
    gauge!("rondo_backend_healthy", "backend" => backend.to_string()).set(value);
}

/// Update the per-backend breaker gauge: 0 closed, 1 open, 2 half-open.
pub fn record_breaker_state(backend: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    gauge!("rondo_breaker_state", "backend" => backend.to_string()).set(value);
}

/// Update the pool membership gauge after an add or remove.
pub fn record_pool_size(backends: usize) {
    gauge!("rondo_pool_backends").set(backends as f64);
}
