use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use std::sync::Arc;

use crate::db::entities::{widget, widget_value};
use crate::db::services::widget_service;
use crate::web::models::widget_models::CreateWidgetRequest;
use crate::web::{AppState, error::AppError};

async fn list_widgets_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<widget::Model>>, AppError> {
    let widgets = widget_service::list_widgets(&app_state.db_pool).await?;
    Ok(Json(widgets))
}

async fn create_widget_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateWidgetRequest>,
) -> Result<(StatusCode, Json<widget::Model>), AppError> {
    let Some(registered) = app_state.widget_registry.get(&payload.widget_type) else {
        return Err(AppError::InvalidInput(format!(
            "Unknown widget type '{}'. Known types: {}",
            payload.widget_type,
            app_state.widget_registry.types().join(", ")
        )));
    };
    if let Some(unknown) = payload
        .widget_fields
        .iter()
        .find(|key| !registered.fields.iter().any(|f| &f.key == *key))
    {
        return Err(AppError::InvalidInput(format!(
            "Field '{unknown}' is not available for widget type '{}'",
            payload.widget_type
        )));
    }
    if payload.widget_name.trim().is_empty() || payload.widget_url.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "widget_name and widget_url are required".to_string(),
        ));
    }

    let created = widget_service::create_widget(&app_state.db_pool, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_widget_handler(
    State(app_state): State<Arc<AppState>>,
    Path(widget_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    widget_service::delete_widget(&app_state.db_pool, widget_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn widget_values_handler(
    State(app_state): State<Arc<AppState>>,
    Path(widget_id): Path<i32>,
) -> Result<Json<Vec<widget_value::Model>>, AppError> {
    let values = widget_service::get_widget_values(&app_state.db_pool, widget_id).await?;
    Ok(Json(values))
}

pub fn create_widget_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_widgets_handler).post(create_widget_handler))
        .route("/{id}", delete(delete_widget_handler))
        .route("/{id}/values", get(widget_values_handler))
}
