use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use cutover_models::TaskSummary;
use cutover_orchestrations::progress::LogEvent;
use cutover_orchestrations::TaskRequest;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::worker::{TaskDetail, Worker};

/// Shared API state
#[derive(Clone)]
pub struct AppState {
    pub worker: Worker,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/orchestrations", get(list_orchestrations))
        .route("/api/tasks", get(list_tasks).post(submit_task))
        .route("/api/tasks/:id", get(get_task))
        .route("/api/tasks/:id/logs", get(get_task_logs))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server
pub async fn start_server(host: &str, port: u16, state: AppState) -> Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("✓ API server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

// ============================================================================
// Health Check
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cutover",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_orchestrations(State(state): State<AppState>) -> Json<Vec<&'static str>> {
    Json(state.worker.orchestrations())
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitTask {
    pub orchestration: String,
    pub request: TaskRequest,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmittedTask {
    pub id: Uuid,
}

async fn submit_task(
    State(state): State<AppState>,
    Json(body): Json<SubmitTask>,
) -> Result<(StatusCode, Json<SubmittedTask>), AppError> {
    let id = state
        .worker
        .submit(&body.orchestration, body.request)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(SubmittedTask { id })))
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskSummary>> {
    Json(state.worker.list().await)
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskDetail>, AppError> {
    let id = parse_id(&id)?;
    state
        .worker
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Task '{}' not found", id)))
}

async fn get_task_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LogEvent>>, AppError> {
    let id = parse_id(&id)?;
    state
        .worker
        .logs(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Task '{}' not found", id)))
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::BadRequest(format!("'{}' is not a task id", id)))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
