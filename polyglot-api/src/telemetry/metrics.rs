//! Prometheus Metrics Definitions
//!
//! Defines all Polyglot metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use polyglot_core::EntityKind;
use polyglot_storage::InvalidationReport;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<PolyglotMetrics>> = Lazy::new(PolyglotMetrics::new);

/// Whether an export was answered from the client's copy or streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    NotModified,
    Streamed,
}

impl ExportOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotModified => "not_modified",
            Self::Streamed => "streamed",
        }
    }
}

/// Container for all Polyglot metrics.
#[derive(Clone)]
pub struct PolyglotMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Export responses - labels: shape, outcome
    pub exports_total: CounterVec,

    /// Invalidation passes - labels: entity, result
    pub cache_invalidations_total: CounterVec,

    /// Cache operations that fell back to the store - labels: operation
    pub cache_degraded_total: CounterVec,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl PolyglotMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "polyglot_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "polyglot_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            exports_total: register_counter_vec!(
                "polyglot_exports_total",
                "Export responses by shape and outcome",
                &["shape", "outcome"]
            )
            .map_err(|e| registration_error("exports_total", e))?,

            cache_invalidations_total: register_counter_vec!(
                "polyglot_cache_invalidations_total",
                "Post-commit cache invalidation passes",
                &["entity", "result"]
            )
            .map_err(|e| registration_error("cache_invalidations_total", e))?,

            cache_degraded_total: register_counter_vec!(
                "polyglot_cache_degraded_total",
                "Cache operations that failed and were skipped",
                &["operation"]
            )
            .map_err(|e| registration_error("cache_degraded_total", e))?,
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

    /// Record how an export request was answered.
    pub fn record_export(&self, shape: &str, outcome: ExportOutcome) {
        self.exports_total
            .with_label_values(&[shape, outcome.as_str()])
            .inc();
    }

    /// Record one invalidation pass.
    pub fn record_invalidation(&self, kind: EntityKind, report: &InvalidationReport) {
        let entity = match kind {
            EntityKind::Translation => "translation",
            EntityKind::Tag => "tag",
        };
        let result = if report.failures == 0 { "ok" } else { "partial" };
        self.cache_invalidations_total
            .with_label_values(&[entity, result])
            .inc();
        if report.failures > 0 {
            self.cache_degraded_total
                .with_label_values(&["invalidate"])
                .inc_by(f64::from(report.failures));
        }
    }

    /// Record a cache read or token write that was skipped.
    pub fn record_cache_degraded(&self, operation: &str) {
        self.cache_degraded_total
            .with_label_values(&[operation])
            .inc();
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
