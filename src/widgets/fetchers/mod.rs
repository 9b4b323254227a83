use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::WidgetFieldSpec;

pub mod json_field;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Widget API returned status {0}")]
    BadStatus(u16),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Widget API reported an error: {0}")]
    Reported(String),
}

/// Fetches the current values of a widget from its upstream API.
///
/// Implementations receive the widget's base URL and key, the field keys the
/// widget asked for, and the field specs registered for the widget type. The
/// returned map is keyed by field key.
#[async_trait]
pub trait WidgetFetcher: Send + Sync {
    async fn fetch(
        &self,
        api_url: &str,
        api_key: Option<&str>,
        requested_fields: &[String],
        available_fields: &[WidgetFieldSpec],
    ) -> Result<HashMap<String, String>, FetchError>;
}
