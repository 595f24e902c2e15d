//! HTTP surface of the compile service
//!
//! Two collaborator-facing endpoints: submission returns a job id immediately
//! (execution is asynchronous), and the read endpoint reports the stored
//! lifecycle state. Input-shape validation lives here, in front of the
//! engine, so malformed submissions never reach a worker queue.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crucible_core::{Job, JobDispatcher, JobStatus, JobStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub dispatcher: Arc<JobDispatcher>,
    pub max_code_chars: usize,
}

#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct CompileResultResponse {
    pub status: JobStatus,
    pub success: Option<bool>,
    pub output: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Shape checks on the submitted source, applied before a job is created.
pub fn validate_request(code: &str, max_code_chars: usize) -> Result<(), String> {
    if code.trim().is_empty() {
        return Err("code must not be empty".to_string());
    }
    let length = code.chars().count();
    if length > max_code_chars {
        return Err(format!(
            "code length must not exceed {} characters",
            max_code_chars
        ));
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/compile/run", post(run_handler))
        .route("/api/compile/result/{job_id}", get(result_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn run_handler(
    State(state): State<AppState>,
    Json(request): Json<CompileRequest>,
) -> Result<Json<CompileResponse>, ApiError> {
    validate_request(&request.code, state.max_code_chars).map_err(|m| bad_request(&m))?;

    let job = Job::new(request.code);
    let job_id = job.id.clone();
    state.store.insert(&job).await;

    if let Err(e) = state.dispatcher.submit(job).await {
        log::error!("job {} could not be queued: {}", job_id, e);
        state
            .store
            .complete(&job_id, false, "System Error: job queue unavailable")
            .await;
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "service is shutting down" })),
        ));
    }

    Ok(Json(CompileResponse { job_id }))
}

async fn result_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CompileResultResponse>, ApiError> {
    match state.store.get(&job_id).await {
        Some(record) => Ok(Json(CompileResultResponse {
            status: record.status,
            success: record.success,
            output: record.output,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown job id: {}", job_id) })),
        )),
    }
}
