use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct CreateWidgetRequest {
    pub widget_name: String,
    pub widget_type: String,
    pub widget_url: String,
    pub widget_api_key: Option<String>,
    #[serde(default)]
    pub widget_fields: Vec<String>,
}
