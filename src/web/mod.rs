use axum::{Router, http::Method, middleware as axum_middleware, routing::get, routing::post};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::server::config::ServerConfig;
use crate::services::backup_service::BackupService;
use crate::services::icon_resolver::IconResolver;
use crate::widgets::WidgetRegistry;
use crate::web::{middleware::auth, routes::*};

pub use error::AppError;

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub icon_resolver: Arc<IconResolver>,
    pub backup_service: Arc<BackupService>,
    pub widget_registry: Arc<WidgetRegistry>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let protected = Router::new()
        .route("/register", post(register_routes::register_handler))
        .nest("/entries", entry_routes::create_entry_router())
        .nest("/groups", group_routes::create_group_router())
        .nest("/widgets", widget_routes::create_widget_router())
        .nest("/backups", backup_routes::create_backup_router())
        .nest("/settings", settings_routes::create_settings_router())
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_api_token,
        ));

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api", protected)
        .layer(cors)
        .with_state(app_state)
}
