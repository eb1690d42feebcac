//! Prometheus metrics

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

const LLM_LATENCY_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0];

/// Install the global recorder; later calls return the same handle
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS.get() {
        return Some(handle.clone());
    }

    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("loominary_llm_latency_seconds".to_string()),
            LLM_LATENCY_BUCKETS,
        )
        .ok()?
        .install_recorder();

    match recorder {
        Ok(handle) => {
            let _ = PROMETHEUS.set(handle.clone());
            Some(handle)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        },
    }
}

pub fn record_request(route: &str, status: StatusCode) {
    metrics::counter!(
        "loominary_http_requests_total",
        "route" => route.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}

/// `kind` is `analysis` or `turn`
pub fn record_llm_latency(kind: &'static str, mock: bool, elapsed: Duration) {
    metrics::histogram!(
        "loominary_llm_latency_seconds",
        "kind" => kind,
        "mock" => if mock { "true" } else { "false" }
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("loominary_errors_total", "kind" => kind).increment(1);
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
