//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_request_duration_seconds` (histogram): latency by method and status code
//! - `keyserver_log_rotations_total` (counter): log sink swaps
//!
//! The Prometheus recorder is process-wide and installed on first use. The
//! supervised metrics task serves its rendering at `GET /metrics`.

use std::sync::OnceLock;
use std::time::Duration;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Handle to the process-wide Prometheus recorder, installing it if needed.
pub fn recorder_handle() -> PrometheusHandle {
    RECORDER
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A global metrics recorder is already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

/// Record one served HTTP request.
pub fn record_http_request(method: &str, status: u16, duration: Duration) {
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "status_code" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a log sink swap.
pub fn record_log_rotation() {
    metrics::counter!("keyserver_log_rotations_total").increment(1);
}

/// Router exposing the Prometheus text rendering.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
