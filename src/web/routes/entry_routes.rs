use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use std::sync::Arc;

use crate::db::services::entry_service;
use crate::web::models::entry_models::{
    DeleteEntryRequest, EntryEdit, NewEntry, ServiceEntryDetails,
};
use crate::web::{AppState, error::AppError};

async fn list_entries_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ServiceEntryDetails>>, AppError> {
    let entries = entry_service::list_entries(&app_state.db_pool, Utc::now()).await?;
    Ok(Json(entries))
}

async fn create_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<NewEntry>,
) -> Result<(StatusCode, Json<ServiceEntryDetails>), AppError> {
    let entry =
        entry_service::create_entry(&app_state.db_pool, &app_state.icon_resolver, payload).await?;
    let details = entry_service::get_entry_details(&app_state.db_pool, entry.id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

async fn get_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Path(entry_id): Path<i32>,
) -> Result<Json<ServiceEntryDetails>, AppError> {
    let details = entry_service::get_entry_details(&app_state.db_pool, entry_id, Utc::now()).await?;
    Ok(Json(details))
}

async fn update_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Path(entry_id): Path<i32>,
    Json(payload): Json<EntryEdit>,
) -> Result<Json<ServiceEntryDetails>, AppError> {
    let entry = entry_service::update_entry(
        &app_state.db_pool,
        &app_state.icon_resolver,
        entry_id,
        payload,
    )
    .await?;
    let details = entry_service::get_entry_details(&app_state.db_pool, entry.id, Utc::now()).await?;
    Ok(Json(details))
}

async fn delete_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Path(entry_id): Path<i32>,
    Json(payload): Json<DeleteEntryRequest>,
) -> Result<StatusCode, AppError> {
    entry_service::delete_entry(&app_state.db_pool, entry_id, &payload.confirm_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_entry_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_entries_handler).post(create_entry_handler))
        .route(
            "/{id}",
            get(get_entry_handler)
                .put(update_entry_handler)
                .delete(delete_entry_handler),
        )
}
