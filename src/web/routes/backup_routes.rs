use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use crate::services::backup_service::{BackupFileInfo, RestoreSummary};
use crate::web::models::backup_models::{BackupCreated, RestoreBackupRequest};
use crate::web::{AppState, error::AppError};

async fn list_backups_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<BackupFileInfo>>, AppError> {
    Ok(Json(app_state.backup_service.list_backups().await?))
}

async fn create_backup_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<BackupCreated>), AppError> {
    let filename = app_state.backup_service.export_backup().await?;
    Ok((StatusCode::CREATED, Json(BackupCreated { filename })))
}

async fn restore_backup_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RestoreBackupRequest>,
) -> Result<Json<RestoreSummary>, AppError> {
    let summary = app_state
        .backup_service
        .restore_backup(&payload.filename)
        .await?;
    Ok(Json(summary))
}

pub fn create_backup_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_backups_handler).post(create_backup_handler))
        .route("/restore", post(restore_backup_handler))
}
