//! Prometheus Metrics Definitions
//!
//! Defines the listcache metrics and exposes a /metrics endpoint for
//! Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

const SEARCH_RESULT_BUCKETS: &[f64] = &[0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0];

/// Global metrics instance, registered on first use.
pub static METRICS: Lazy<ApiResult<ListcacheMetrics>> = Lazy::new(ListcacheMetrics::new);

/// Container for all listcache metrics.
#[derive(Clone)]
pub struct ListcacheMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Change records by outcome - labels: outcome (upserted/removed/dropped)
    pub sync_records_total: CounterVec,

    /// Change batches - labels: status (success/failure)
    pub sync_batches_total: CounterVec,

    /// Matches returned per radius search
    pub search_results: Histogram,
}

impl ListcacheMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "listcache_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "listcache_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            sync_records_total: register_counter_vec!(
                "listcache_sync_records_total",
                "Change records handled, by outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register sync_records_total: {}", e)))?,

            sync_batches_total: register_counter_vec!(
                "listcache_sync_batches_total",
                "Change batches handled, by status",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register sync_batches_total: {}", e)))?,

            search_results: register_histogram!(
                "listcache_search_results",
                "Matches returned per radius search",
                SEARCH_RESULT_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register search_results: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record the outcome of a change batch.
    pub fn record_sync_batch(&self, upserted: usize, removed: usize, dropped: usize, success: bool) {
        for (outcome, count) in [("upserted", upserted), ("removed", removed), ("dropped", dropped)] {
            self.sync_records_total
                .with_label_values(&[outcome])
                .inc_by(count as f64);
        }
        let status = if success { "success" } else { "failure" };
        self.sync_batches_total.with_label_values(&[status]).inc();
    }

    pub fn record_search(&self, hits: usize) {
        self.search_results.observe(hits as f64);
    }
}

/// Run `f` against the global metrics, if they registered.
pub fn with_metrics(f: impl FnOnce(&ListcacheMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
