use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::ProviderConfig;
use crate::runtime::Runtime;
use crate::storage::{StorageConfig, StoreError};
use crate::task::{GenerationRequest, ModuleKind, TaskError, TaskOrchestrator};

pub type AppState = Arc<Runtime>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown module: {0}")]
    UnknownModule(String),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownModule(_) => StatusCode::NOT_FOUND,
            ApiError::Task(TaskError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Task(TaskError::AlreadyRunning) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::QuotaExceeded { .. }) => StatusCode::INSUFFICIENT_STORAGE,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn orchestrator<'a>(runtime: &'a Runtime, module: &str) -> Result<&'a TaskOrchestrator, ApiError> {
    ModuleKind::parse(module)
        .and_then(|kind| runtime.orchestrator(kind))
        .ok_or_else(|| ApiError::UnknownModule(module.to_string()))
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn handle_start(
    State(runtime): State<AppState>,
    Path(module): Path<String>,
    Json(req): Json<GenerationRequest>,
) -> ApiResult {
    let orch = orchestrator(&runtime, &module)?;
    let task_id = orch.start(req)?;
    Ok(Json(json!({"taskId": task_id})))
}

pub async fn handle_current(State(runtime): State<AppState>, Path(module): Path<String>) -> ApiResult {
    let orch = orchestrator(&runtime, &module)?;
    let task = orch.current().and_then(|id| orch.status(&id).ok());
    Ok(Json(json!({"task": task})))
}

pub async fn handle_status(
    State(runtime): State<AppState>,
    Path((module, task_id)): Path<(String, String)>,
) -> ApiResult {
    let snapshot = orchestrator(&runtime, &module)?.status(&task_id)?;
    Ok(Json(json!(snapshot)))
}

pub async fn handle_close(
    State(runtime): State<AppState>,
    Path((module, task_id)): Path<(String, String)>,
) -> ApiResult {
    let orch = orchestrator(&runtime, &module)?;
    let changed = orch.notify_ui_closed(&task_id);
    Ok(Json(json!({"backgrounded": changed})))
}

pub async fn handle_cancel(
    State(runtime): State<AppState>,
    Path((module, task_id)): Path<(String, String)>,
) -> ApiResult {
    let orch = orchestrator(&runtime, &module)?;
    orch.cancel(&task_id).await?;
    let snapshot = orch.status(&task_id)?;
    Ok(Json(json!(snapshot)))
}

pub async fn handle_history(
    State(runtime): State<AppState>,
    Path(module): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let orch = orchestrator(&runtime, &module)?;
    let mut entries = orch.store().history();
    if let Some(limit) = query.limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }
    Ok(Json(json!({"entries": entries})))
}

pub async fn handle_outputs(State(runtime): State<AppState>, Path(module): Path<String>) -> ApiResult {
    let orch = orchestrator(&runtime, &module)?;
    Ok(Json(json!({"lastOutputs": orch.store().last_outputs()})))
}

pub async fn handle_get_storage_config(
    State(runtime): State<AppState>,
    Path(module): Path<String>,
) -> ApiResult {
    let orch = orchestrator(&runtime, &module)?;
    Ok(Json(json!(orch.store().storage_config())))
}

pub async fn handle_put_storage_config(
    State(runtime): State<AppState>,
    Path(module): Path<String>,
    Json(cfg): Json<StorageConfig>,
) -> ApiResult {
    let store = orchestrator(&runtime, &module)?.store();
    let saved = store.set_storage_config(cfg)?;
    store.evict_if_needed()?;
    Ok(Json(json!(saved)))
}

pub async fn handle_get_api_config(State(runtime): State<AppState>) -> Json<Value> {
    Json(json!(runtime.provider_config().redacted()))
}

pub async fn handle_put_api_config(
    State(runtime): State<AppState>,
    Json(mut cfg): Json<ProviderConfig>,
) -> ApiResult {
    // A UI echoing back the redacted form keeps the stored credential.
    if cfg.credential == "***" {
        cfg.credential = runtime.provider_config().credential;
    }
    let saved = runtime.set_provider_config(cfg)?;
    Ok(Json(json!(saved.redacted())))
}

pub async fn handle_notifications(State(runtime): State<AppState>) -> Json<Value> {
    Json(json!({"notifications": runtime.toasts.drain()}))
}
