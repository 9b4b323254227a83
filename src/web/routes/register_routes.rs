use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::services::entry_service::{self, RegistrationOutcome};
use crate::services::field_aliases::normalize_registration;
use crate::web::{AppState, error::AppError};

/// `POST /api/register`: upsert from a container agent.
pub async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body.map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
    let payload = normalize_registration(&body).map_err(AppError::InvalidInput)?;

    let (entry, outcome) =
        entry_service::register(&app_state.db_pool, &app_state.icon_resolver, payload).await?;

    let status = match outcome {
        RegistrationOutcome::SkippedStatic => {
            return Ok((
                StatusCode::OK,
                Json(json!({ "status": "skipped", "reason": "static lock" })),
            )
                .into_response());
        }
        RegistrationOutcome::Created => StatusCode::CREATED,
        RegistrationOutcome::Updated => StatusCode::OK,
    };

    let details = entry_service::get_entry_details(&app_state.db_pool, entry.id, Utc::now()).await?;
    Ok((status, Json(details)).into_response())
}
