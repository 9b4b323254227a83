use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::db::services::{EntryError, GroupError, WidgetError};
use crate::services::backup_service::BackupError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::DatabaseError(msg) => {
                error!(error = %msg, "Database error while handling request.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {msg}"),
                )
            }
            AppError::InternalServerError(msg) => {
                error!(error = %msg, "Internal error while handling request.");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<EntryError> for AppError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::MissingFields(_)
            | EntryError::InvalidPayload(_)
            | EntryError::ConfirmationMismatch => AppError::InvalidInput(err.to_string()),
            EntryError::NotFound => AppError::NotFound(err.to_string()),
            EntryError::Conflict(msg) => AppError::Conflict(msg),
            EntryError::Database(e) => e.into(),
        }
    }
}

impl From<GroupError> for AppError {
    fn from(err: GroupError) -> Self {
        match err {
            GroupError::NotFound => AppError::NotFound(err.to_string()),
            GroupError::AlreadyExists(_) | GroupError::NotEmpty(_) => {
                AppError::Conflict(err.to_string())
            }
            GroupError::Database(e) => e.into(),
        }
    }
}

impl From<WidgetError> for AppError {
    fn from(err: WidgetError) -> Self {
        match err {
            WidgetError::NotFound => AppError::NotFound(err.to_string()),
            WidgetError::AlreadyExists(_) => AppError::Conflict(err.to_string()),
            WidgetError::Database(e) => e.into(),
        }
    }
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::InvalidFilename(_) | BackupError::Yaml(_) => {
                AppError::InvalidInput(err.to_string())
            }
            BackupError::NotFound(_) => AppError::NotFound(err.to_string()),
            BackupError::Io(e) => AppError::InternalServerError(e.to_string()),
            BackupError::Database(e) => e.into(),
        }
    }
}
