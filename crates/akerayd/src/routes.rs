//! API routes for akerayd

use crate::normalizer::{into_response_service, normalize, NormalizedError};
use crate::server::AppState;
use akeray_common::{HealthResponse, Outcome};
use axum::{
    extract::{FromRequest, Request, State},
    routing::{get, post_service},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::service_fn;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Outcome Routes
// ============================================================================

/// `POST /v1/outcome` resolves or fails with the value in the body.
///
/// The handler's error channel runs through the normalizer, so failures come
/// back as 400 with the failure value as payload.
pub fn outcome_routes() -> Router<AppStateArc> {
    Router::new().route(
        "/v1/outcome",
        post_service(into_response_service(service_fn(resolve_outcome))),
    )
}

async fn resolve_outcome(request: Request) -> Result<Json<Value>, Value> {
    let Json(outcome) = Json::<Outcome<Value, Value>>::from_request(request, &())
        .await
        .map_err(|rejection| Value::String(rejection.body_text()))?;

    outcome.into_result().map(Json)
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
    })
}

// ============================================================================
// Metrics Routes
// ============================================================================

pub fn metrics_routes() -> Router<AppStateArc> {
    Router::new().route("/metrics", get(metrics_export))
}

async fn metrics_export(
    State(state): State<AppStateArc>,
) -> Result<String, NormalizedError<String>> {
    normalize(state.metrics.export().map_err(|e| e.to_string()))
}
