use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::models::{PreviewId, PreviewRequest, PreviewSession};
use super::pipeline::PreviewPipeline;
use super::registry::PreviewRegistry;
use crate::errors::PreviewError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub registry: Arc<PreviewRegistry>,
    pub pipeline: PreviewPipeline,
}

impl AppState {
    pub fn new(pipeline: PreviewPipeline) -> Self {
        Self {
            registry: pipeline.registry().clone(),
            pipeline,
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request / response payload types ──────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewCreated {
    pub id: PreviewId,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub purge: bool,
}

#[derive(Debug, Serialize)]
pub struct PreviewListing {
    pub id: PreviewId,
    #[serde(flatten)]
    pub session: PreviewSession,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<PreviewError> for ApiError {
    fn from(err: PreviewError) -> Self {
        match err {
            PreviewError::Validation(msg) => ApiError::BadRequest(msg),
            e @ PreviewError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/preview", post(create_preview))
        .route("/api/preview/{id}", axum::routing::delete(delete_preview))
        .route("/api/preview/{id}/status", get(preview_status))
        .route("/api/previews", get(list_previews))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn create_preview(
    State(state): State<SharedState>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<PreviewCreated>, ApiError> {
    let Json(request) = payload?;
    let id = state.pipeline.submit(request).await?;
    Ok(Json(PreviewCreated {
        id,
        status: "building".to_string(),
    }))
}

async fn preview_status(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Result<Json<PreviewSession>, ApiError> {
    let id = PreviewId::parse(&raw_id)?;
    let session = state.registry.read(&id).await?;
    Ok(Json(session))
}

async fn delete_preview(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = PreviewId::parse(&raw_id)?;
    state.pipeline.teardown(&id, params.purge).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn list_previews(State(state): State<SharedState>) -> Json<Vec<PreviewListing>> {
    let previews = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|(id, session)| PreviewListing { id, session })
        .collect();
    Json(previews)
}
