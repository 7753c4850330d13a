//! Prometheus metrics for the HTTP surface
//!
//! Recorded by a middleware outside the normalizer, so normalization itself
//! stays free of shared state.

use crate::normalizer::Normalized;
use akeray_common::AkerayError;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::debug;

/// Request counters exposed at /metrics
#[derive(Clone)]
pub struct HttpMetrics {
    pub requests_total: IntCounterVec,
    pub normalized_errors_total: IntCounter,

    registry: Arc<Registry>,
}

impl HttpMetrics {
    pub fn new() -> Result<Self, AkerayError> {
        let registry = Registry::new();

        let requests_total = register_int_counter_vec_with_registry!(
            "akeray_http_requests_total",
            "Total number of HTTP requests by response status",
            &["status"],
            registry
        )
        .map_err(metrics_error)?;

        let normalized_errors_total = register_int_counter_with_registry!(
            "akeray_http_normalized_errors_total",
            "Total number of handler failures answered as normalized bad requests",
            registry
        )
        .map_err(metrics_error)?;

        Ok(Self {
            requests_total,
            normalized_errors_total,
            registry: Arc::new(registry),
        })
    }

    /// Record one finished request
    pub fn record(&self, status: StatusCode, normalized: bool) {
        self.requests_total
            .with_label_values(&[status.as_str()])
            .inc();
        if normalized {
            self.normalized_errors_total.inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, AkerayError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| AkerayError::Metrics(e.to_string()))
    }
}

fn metrics_error(e: prometheus::Error) -> AkerayError {
    AkerayError::Metrics(e.to_string())
}

/// Middleware counting responses by status
pub async fn track_requests(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let normalized = response.extensions().get::<Normalized>().is_some();
    metrics.record(response.status(), normalized);
    debug!(
        "{} -> {}{}",
        path,
        response.status(),
        if normalized { " (normalized)" } else { "" }
    );

    response
}
