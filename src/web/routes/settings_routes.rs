use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::server::config::ServerConfig;
use crate::web::AppState;

#[derive(Serialize)]
struct SettingsResponse {
    #[serde(flatten)]
    settings: ServerConfig,
    widget_types: Vec<String>,
}

/// Effective settings, without secrets.
async fn get_settings_handler(State(app_state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        settings: app_state.config.as_ref().clone(),
        widget_types: app_state
            .widget_registry
            .types()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

pub fn create_settings_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_settings_handler))
}
