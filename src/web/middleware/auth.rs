use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::{AppState, error::AppError};

/// Rejects requests that do not carry `Authorization: Bearer <api_token>`.
pub async fn require_api_token(
    State(state): State<Arc<AppState>>,
    req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    if token.trim() != state.config.api_token {
        warn!(path = %req.uri().path(), "Rejected request with invalid API token.");
        return Err(AppError::Unauthorized("Invalid API token".to_string()));
    }
    Ok(next.run(req).await)
}
