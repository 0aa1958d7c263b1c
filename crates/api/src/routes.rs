use aggregate::{Association, EntitySnapshot, ExportSnapshot, Summary};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::runs::{self, StartError, StartedRun};
use crate::state::{AppState, CompletedRun, RunState, RunView};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/runs", post(create_run))
        .route("/runs/:id", get(get_run))
        .route("/runs/:id/summary", get(get_summary))
        .route("/runs/:id/biomarkers/:name", get(get_biomarker))
        .route("/runs/:id/associations", get(get_associations))
        .route("/runs/:id/export", get(get_export))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        let status = match &err {
            StartError::Config(_) => StatusCode::BAD_REQUEST,
            StartError::Documents(ingest::ReadError::NotFound(_)) => StatusCode::NOT_FOUND,
            StartError::Documents(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = match state.summarizer.health().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };

    Json(HealthResponse {
        status: "ok",
        backend,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateRunRequest {
    papers_dir: Option<PathBuf>,
    workers: Option<usize>,
}

async fn create_run(
    State(state): State<AppState>,
    Json(req): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<StartedRun>), ApiError> {
    let runner_config = state
        .config
        .runner_with_workers(req.workers)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e))?;
    let papers_dir = state
        .config
        .papers_subdir(req.papers_dir.as_deref())
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e))?;

    let started = runs::start_run(&state, &papers_dir, runner_config).await?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunView>, ApiError> {
    let run = lookup(&state, id)?;
    Ok(Json(run.view(id)))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Summary>, ApiError> {
    let run = completed(&state, id)?;
    Ok(Json(run.engine.summary()))
}

async fn get_biomarker(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Json<EntitySnapshot>, ApiError> {
    let run = completed(&state, id)?;
    run.engine
        .details(&name)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("biomarker {name:?} not found")))
}

#[derive(Debug, Deserialize)]
struct AssociationParams {
    min_papers: Option<usize>,
}

async fn get_associations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<AssociationParams>,
) -> Result<Json<Vec<Association>>, ApiError> {
    let run = completed(&state, id)?;
    let min_papers = params
        .min_papers
        .unwrap_or(state.config.min_papers_for_high_confidence);
    Ok(Json(run.engine.high_confidence_associations(min_papers)))
}

async fn get_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExportSnapshot>, ApiError> {
    let run = completed(&state, id)?;
    Ok(Json(run.engine.export()))
}

fn lookup(state: &AppState, id: Uuid) -> Result<RunState, ApiError> {
    state
        .runs
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("run {id} not found")))
}

fn completed(state: &AppState, id: Uuid) -> Result<Arc<CompletedRun>, ApiError> {
    match lookup(state, id)? {
        RunState::Completed(run) => Ok(run),
        RunState::Running { .. } => Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("run {id} is still running"),
        )),
        RunState::Failed { error } => Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("run {id} failed: {error}"),
        )),
    }
}
