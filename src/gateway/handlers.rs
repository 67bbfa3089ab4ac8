use super::AppState;
use crate::engine::{CallOptions, Pipeline};
use crate::error::EngineError;
use crate::llm::ChatMessage;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

/// Execute request body
#[derive(Deserialize)]
pub(super) struct ExecuteBody {
    pub pipeline: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: CallOptions,
}

fn engine_error_status(error: &EngineError) -> StatusCode {
    match error {
        EngineError::PipelineNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Filter { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Provider(provider_error) if provider_error.is_caller_error() => {
            StatusCode::BAD_REQUEST
        }
        EngineError::Provider(_) | EngineError::AllProvidersFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn engine_error_body(error: &EngineError) -> serde_json::Value {
    match error {
        EngineError::AllProvidersFailed {
            pipeline,
            attempted,
            last_error,
        } => serde_json::json!({
            "error": error.to_string(),
            "pipeline": pipeline,
            "attempted_providers": attempted,
            "last_error": last_error,
        }),
        _ => serde_json::json!({ "error": error.to_string() }),
    }
}

/// GET /health
pub(super) async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "providers": state.engine.providers().len(),
        "cache_entries": state.engine.cache().len(),
    });
    Json(body)
}

/// POST /api/ai/execute, the inbound orchestration call
pub(super) async fn handle_execute(
    State(state): State<AppState>,
    body: Result<Json<ExecuteBody>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match body {
        Ok(b) => b,
        Err(e) => {
            let err = serde_json::json!({
                "error": format!(
                    "Invalid JSON: {e}. Expected: {{\"pipeline\": \"...\", \"messages\": [...]}}"
                )
            });
            return (StatusCode::BAD_REQUEST, Json(err));
        }
    };

    match state
        .engine
        .execute(&request.pipeline, request.messages, request.options)
        .await
    {
        Ok(result) => {
            let body = serde_json::to_value(&result)
                .unwrap_or_else(|_| serde_json::json!({"error": "serialization failed"}));
            (StatusCode::OK, Json(body))
        }
        Err(error) => {
            tracing::warn!(pipeline = request.pipeline.as_str(), %error, "execute failed");
            (engine_error_status(&error), Json(engine_error_body(&error)))
        }
    }
}

/// GET /api/ai/providers
pub(super) async fn handle_list_providers(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.providers().list())
}

/// GET /api/ai/pipelines
pub(super) async fn handle_list_pipelines(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.pipelines().list())
}

/// POST /api/ai/pipelines, runtime registration / hot replacement
pub(super) async fn handle_register_pipeline(
    State(state): State<AppState>,
    body: Result<Json<Pipeline>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    let Json(pipeline) = match body {
        Ok(b) => b,
        Err(e) => {
            let err = serde_json::json!({"error": format!("Invalid pipeline JSON: {e}")});
            return (StatusCode::BAD_REQUEST, Json(err));
        }
    };

    let id = pipeline.id.clone();
    match state.engine.pipelines().register(
        pipeline,
        state.engine.providers(),
        state.engine.filters(),
    ) {
        Ok(()) => {
            tracing::info!(pipeline = id.as_str(), "pipeline registered via admin surface");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({"status": "registered", "id": id})),
            )
        }
        Err(error) => (
            engine_error_status(&error),
            Json(engine_error_body(&error)),
        ),
    }
}

/// GET /api/ai/filters
pub(super) async fn handle_list_filters(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.filters().list())
}

/// GET /api/ai/metrics
pub(super) async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.tracker().snapshot())
}

/// POST /api/ai/metrics/reset
pub(super) async fn handle_metrics_reset(State(state): State<AppState>) -> impl IntoResponse {
    state.engine.tracker().reset();
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /api/ai/cache/clear
pub(super) async fn handle_cache_clear(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.engine.cache().clear();
    Json(serde_json::json!({"status": "ok", "cleared": cleared}))
}
