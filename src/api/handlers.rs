// dietops/src/api/handlers.rs
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::AppState;
use super::auth::AdminCaller;
use crate::errors::{OpsError, Result};
use crate::maintenance::{MaintenanceSchedule, ScheduleUpdate};
use crate::store::BackupArtifact;
use crate::tasks::TaskStatus;
use crate::utils::format_bytes;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStarted {
    pub task_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactView {
    #[serde(flatten)]
    pub artifact: BackupArtifact,
    pub size_formatted: String,
}

impl From<BackupArtifact> for ArtifactView {
    fn from(artifact: BackupArtifact) -> Self {
        let size_formatted = format_bytes(artifact.size_bytes);
        Self {
            artifact,
            size_formatted,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub filename: Option<String>,
}

fn accepted(task_id: String) -> Response {
    (StatusCode::ACCEPTED, Json(TaskStarted { task_id })).into_response()
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn start_backup_handler(_: AdminCaller, State(state): State<Arc<AppState>>) -> Response {
    let (task_id, _) = state.engine.start_backup();
    accepted(task_id)
}

pub async fn list_backups_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ArtifactView>> {
    let artifacts = state.engine.store().list().await;
    Json(artifacts.into_iter().map(ArtifactView::from).collect())
}

pub async fn download_backup_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    let (file, len) = state.engine.store().open(&name).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .map_err(|e| OpsError::Validation(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/sql")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        body,
    )
        .into_response())
}

pub async fn delete_backup_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.engine.store().delete(&name).await?;
    Ok(Json(json!({ "message": format!("Backup {} deleted successfully", name) })))
}

pub async fn start_restore_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
    Json(request): Json<RestoreRequest>,
) -> Result<Response> {
    let filename = request
        .filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| OpsError::Validation("filename is required".to_string()))?;
    let (task_id, _) = state.engine.start_restore(&filename).await?;
    Ok(accepted(task_id))
}

pub async fn start_maintenance_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
) -> Response {
    let (task_id, _) = state.engine.start_maintenance();
    accepted(task_id)
}

pub async fn task_status_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Json<TaskStatus> {
    Json(state.engine.status(&task_id))
}

pub async fn get_schedule_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
) -> Json<MaintenanceSchedule> {
    Json(state.engine.schedule().get().await)
}

pub async fn update_schedule_handler(
    _: AdminCaller,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ScheduleUpdate>,
) -> Result<Json<MaintenanceSchedule>> {
    Ok(Json(state.engine.schedule().update(update).await?))
}
