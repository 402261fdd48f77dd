//! HTTP/JSON façade, including the MCP and A2A agent entry points.
//!
//! Handlers only translate between wire shapes and the orchestrator's
//! internal model; no business logic lives here.

use axum::{Json, Router, extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, routing::{get, post}};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::models::{
    AgentParams, GenerateCartImageResponse, GenerationRequest, GetStatusResponse,
    UploadBackgroundRequest, UploadBackgroundResponse,
};
use crate::orchestrator::{GenerateError, Orchestrator};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/generate-image", post(generate_image))
        .route("/api/v1/upload-background", post(upload_background))
        .route("/api/v1/status/:generation_id", get(generation_status))
        .route("/mcp", post(mcp_handler))
        .route("/a2a", post(a2a_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn generate_image(
    State(state): State<AppState>,
    Json(body): Json<GenerationRequest>,
) -> Response {
    match state.orchestrator.generate(body).await {
        Ok(outcome) => Json(GenerateCartImageResponse::from(outcome)).into_response(),
        Err(err @ GenerateError::EmptyRequest) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": err.to_string(), "status": "failed"})),
        )
            .into_response(),
        Err(GenerateError::Pipeline { message, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": message, "status": "failed"})),
        )
            .into_response(),
    }
}

async fn upload_background(
    State(state): State<AppState>,
    Json(body): Json<UploadBackgroundRequest>,
) -> Json<UploadBackgroundResponse> {
    let asset = state.orchestrator.upload_background(&body.image_data).await;
    Json(UploadBackgroundResponse::from(asset))
}

async fn generation_status(
    Path(generation_id): Path<String>,
    State(state): State<AppState>,
) -> Json<GetStatusResponse> {
    Json(GetStatusResponse::from(state.orchestrator.job_status(&generation_id)))
}

// --- Agent-protocol façades ---

#[derive(Debug, Deserialize)]
struct McpEnvelope {
    action: String,
    #[serde(default)]
    params: AgentParams,
}

#[derive(Debug, Deserialize)]
struct A2aEnvelope {
    method: String,
    #[serde(default)]
    params: AgentParams,
}

/// Shared generate path for both agent envelopes; only the envelope key
/// differs between them.
async fn agent_generate(state: &AppState, params: AgentParams) -> Json<Value> {
    match state.orchestrator.generate(params.into()).await {
        Ok(outcome) => Json(json!({
            "result": {
                "image_url": outcome.image_url,
                "generation_id": outcome.generation_id.to_string(),
                "status": outcome.status,
            },
            "status": "success",
        })),
        Err(err) => Json(json!({"status": "error", "message": err.to_string()})),
    }
}

async fn mcp_handler(State(state): State<AppState>, Json(envelope): Json<McpEnvelope>) -> Json<Value> {
    if envelope.action == "generate_image" {
        agent_generate(&state, envelope.params).await
    } else {
        Json(json!({"status": "error", "message": "Unknown action"}))
    }
}

async fn a2a_handler(State(state): State<AppState>, Json(envelope): Json<A2aEnvelope>) -> Json<Value> {
    if envelope.method == "generate_image" {
        agent_generate(&state, envelope.params).await
    } else {
        Json(json!({"status": "error", "message": "Unknown method"}))
    }
}
