use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use super::{FetchError, WidgetFetcher};
use crate::widgets::WidgetFieldSpec;

/// Fetches JSON endpoints authenticated with an `X-Api-Key` header, as
/// exposed by the *arr family. Every endpoint is requested once per fetch,
/// however many fields read from it.
pub struct JsonFieldFetcher {
    client: Client,
}

impl JsonFieldFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn get_json(
        &self,
        url: &str,
        api_key: Option<&str>,
    ) -> Result<Value, FetchError> {
        let mut request = self.client.get(url);
        if let Some(key) = api_key {
            request = request.header("X-Api-Key", key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl WidgetFetcher for JsonFieldFetcher {
    async fn fetch(
        &self,
        api_url: &str,
        api_key: Option<&str>,
        requested_fields: &[String],
        available_fields: &[WidgetFieldSpec],
    ) -> Result<HashMap<String, String>, FetchError> {
        let mut by_path: BTreeMap<&str, Vec<&WidgetFieldSpec>> = BTreeMap::new();
        for key in requested_fields {
            match available_fields.iter().find(|f| &f.key == key) {
                Some(spec) => by_path.entry(spec.api_path.as_str()).or_default().push(spec),
                None => warn!(field = %key, "Requested widget field is not available."),
            }
        }

        let base = api_url.trim_end_matches('/');
        let mut values = HashMap::new();
        for (path, specs) in by_path {
            let url = format!("{base}{path}");
            debug!(url = %url, fields = specs.len(), "Requesting widget endpoint.");
            let data = self.get_json(&url, api_key).await?;
            for spec in specs {
                match extract(&data, spec.response_path.as_deref()) {
                    Some(value) => {
                        values.insert(spec.key.clone(), value);
                    }
                    None => debug!(field = %spec.key, url = %url, "Field missing from response."),
                }
            }
        }
        Ok(values)
    }
}

/// Reads a dotted `response_path` from `data`. Without a path, list
/// responses yield their length.
fn extract(data: &Value, response_path: Option<&str>) -> Option<String> {
    let value = match response_path {
        Some(path) => path
            .split('.')
            .try_fold(data, |current, segment| current.get(segment))?,
        None => match data {
            Value::Array(items) => return Some(items.len().to_string()),
            other => other,
        },
    };
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(items.len().to_string()),
        other => Some(other.to_string()),
    }
}
