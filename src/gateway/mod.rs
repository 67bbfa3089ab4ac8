//! Axum-based HTTP surface for the orchestration engine.
//!
//! Two groups of routes:
//! - `POST /api/ai/execute`: the one inbound call downstream consumers
//!   (the CRUD layer, OCR service, code generators) use.
//! - The admin surface: list providers/pipelines/filters, metrics
//!   snapshot/reset, cache clear, runtime pipeline registration.
//!
//! Authentication is deliberately absent here; the deployment fronts this
//! service with the studio's own auth proxy.

mod handlers;

use crate::engine::ExecutionEngine;
use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use handlers::{
    handle_cache_clear, handle_execute, handle_health, handle_list_filters,
    handle_list_pipelines, handle_list_providers, handle_metrics, handle_metrics_reset,
    handle_register_pipeline,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (1 MiB); OCR-extracted conversations get big
pub const MAX_BODY_SIZE: usize = 1_048_576;
/// Request timeout; must outlive the slowest multi-provider fallback chain
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExecutionEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/ai/execute", post(handle_execute))
        .route("/api/ai/providers", get(handle_list_providers))
        .route(
            "/api/ai/pipelines",
            get(handle_list_pipelines).post(handle_register_pipeline),
        )
        .route("/api/ai/filters", get(handle_list_filters))
        .route("/api/ai/metrics", get(handle_metrics))
        .route("/api/ai/metrics/reset", post(handle_metrics_reset))
        .route("/api/ai/cache/clear", post(handle_cache_clear))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the gateway until `shutdown` is cancelled.
pub async fn run_gateway(
    host: &str,
    port: u16,
    engine: Arc<ExecutionEngine>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_gateway_with_listener(listener, engine, shutdown).await
}

/// Serve the gateway from a pre-bound listener. Split out so tests can bind
/// an ephemeral port first.
pub async fn run_gateway_with_listener(
    listener: tokio::net::TcpListener,
    engine: Arc<ExecutionEngine>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "gateway listening");

    let app = router(AppState { engine });
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}
