//! HTTP server for akerayd

use crate::metrics::{self, HttpMetrics};
use crate::normalizer;
use crate::routes;
use akeray_common::{AkerayConfig, AkerayError, ServerConfig};
use anyhow::Result;
use axum::{extract::DefaultBodyLimit, middleware, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Application state shared across handlers
pub struct AppState {
    pub metrics: HttpMetrics,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(metrics: HttpMetrics) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

/// Assemble the API routes behind the layer stack
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let http_metrics = state.metrics.clone();
    let state = Arc::new(state);

    let routes = Router::new()
        .merge(routes::outcome_routes())
        .merge(routes::health_routes())
        .merge(routes::metrics_routes())
        .with_state(state);

    apply_layers(routes, http_metrics, config)
}

/// Wrap a router in the daemon's layer stack.
///
/// Panics are caught closest to the handlers. `max_body_bytes` is the only
/// body limit; axum's extractor default is disabled. Metrics sit outside the
/// body limit and timeout so rejected requests are counted too.
pub fn apply_layers(router: Router, http_metrics: HttpMetrics, config: &ServerConfig) -> Router {
    router
        .layer(normalizer::catch_panic_layer())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(middleware::from_fn_with_state(
            http_metrics,
            metrics::track_requests,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until ctrl-c
pub async fn run(config: AkerayConfig) -> Result<()> {
    config.validate().map_err(log_failure)?;
    let addr = config.server.socket_addr().map_err(log_failure)?;

    let state = AppState::new(HttpMetrics::new().map_err(log_failure)?);
    let app = build_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("  Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

fn log_failure(e: AkerayError) -> AkerayError {
    error!(kind = e.kind(), "Startup failed: {}", e);
    e
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
