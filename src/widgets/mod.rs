//! Widget types and the fetchers that refresh their values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub mod fetchers;

use fetchers::WidgetFetcher;
use fetchers::json_field::JsonFieldFetcher;

/// Per-request timeout for widget upstream APIs.
pub const WIDGET_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Describes where a widget field lives in the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetFieldSpec {
    pub key: String,
    pub api_path: String,
    /// Dotted path into the JSON response. `None` on a list endpoint means
    /// "number of items".
    pub response_path: Option<String>,
}

impl WidgetFieldSpec {
    pub fn new(key: &str, api_path: &str, response_path: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            api_path: api_path.to_string(),
            response_path: response_path.map(String::from),
        }
    }
}

pub struct RegisteredWidget {
    pub fetcher: Arc<dyn WidgetFetcher>,
    pub fields: Vec<WidgetFieldSpec>,
}

/// Fetchers keyed by `widget_type`.
#[derive(Default)]
pub struct WidgetRegistry {
    widgets: HashMap<String, RegisteredWidget>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        widget_type: &str,
        fetcher: Arc<dyn WidgetFetcher>,
        fields: Vec<WidgetFieldSpec>,
    ) {
        self.widgets
            .insert(widget_type.to_string(), RegisteredWidget { fetcher, fields });
    }

    pub fn get(&self, widget_type: &str) -> Option<&RegisteredWidget> {
        self.widgets.get(widget_type)
    }

    pub fn contains(&self, widget_type: &str) -> bool {
        self.widgets.contains_key(widget_type)
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.widgets.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// The built-in widget types.
pub fn default_registry() -> Result<WidgetRegistry, reqwest::Error> {
    let json: Arc<dyn WidgetFetcher> = Arc::new(JsonFieldFetcher::new(WIDGET_FETCH_TIMEOUT)?);
    let mut registry = WidgetRegistry::new();

    registry.register(
        "radarr",
        json.clone(),
        vec![
            WidgetFieldSpec::new("movies", "/api/v3/movie", None),
            WidgetFieldSpec::new("wanted", "/api/v3/wanted/missing", Some("totalRecords")),
            WidgetFieldSpec::new("queued", "/api/v3/queue", Some("totalRecords")),
        ],
    );
    registry.register(
        "sonarr",
        json.clone(),
        vec![
            WidgetFieldSpec::new("series", "/api/v3/series", None),
            WidgetFieldSpec::new("wanted", "/api/v3/wanted/missing", Some("totalRecords")),
            WidgetFieldSpec::new("queued", "/api/v3/queue", Some("totalRecords")),
        ],
    );
    registry.register(
        "bazarr",
        json,
        vec![
            WidgetFieldSpec::new("episodes", "/api/badges", Some("episodes")),
            WidgetFieldSpec::new("movies", "/api/badges", Some("movies")),
            WidgetFieldSpec::new("providers", "/api/badges", Some("providers")),
        ],
    );

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_types() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.types(), vec!["bazarr", "radarr", "sonarr"]);
        assert!(!registry.contains("plex"));
        let radarr = registry.get("radarr").unwrap();
        assert!(radarr.fields.iter().any(|f| f.key == "movies"));
    }
}
