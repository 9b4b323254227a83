use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use std::sync::Arc;

use crate::db::entities::service_group;
use crate::db::services::group_service::{self, GroupWithCount};
use crate::web::models::entry_models::CreateGroupRequest;
use crate::web::{AppState, error::AppError};

async fn list_groups_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<GroupWithCount>>, AppError> {
    let groups = group_service::list_groups_with_counts(&app_state.db_pool).await?;
    Ok(Json(groups))
}

async fn create_group_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<service_group::Model>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Group name is required".to_string()));
    }
    let group = group_service::create_group(
        &app_state.db_pool,
        &payload.name,
        payload.sort_priority.unwrap_or(0),
        payload.icon,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn delete_group_handler(
    State(app_state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    group_service::delete_group(&app_state.db_pool, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_group_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_groups_handler).post(create_group_handler))
        .route("/{id}", delete(delete_group_handler))
}
