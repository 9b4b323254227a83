//! Maps the many key conventions registration clients use onto the canonical
//! entry field names.

use serde_json::{Map, Value};
use tracing::warn;

use crate::web::models::entry_models::RegistrationPayload;

/// Incoming key → canonical key. Nested objects are flattened to dotted keys
/// before lookup, so `{"internal": {"health": true}}` matches `internal.health`.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("docker_host", "host"),
    ("hostname", "host"),
    ("container", "container_name"),
    ("name", "container_name"),
    ("id", "container_id"),
    ("internal_url", "internalurl"),
    ("internal.url", "internalurl"),
    ("external_url", "externalurl"),
    ("external.url", "externalurl"),
    ("status", "docker_status"),
    ("state", "docker_status"),
    ("stack", "stack_name"),
    ("group", "group_name"),
    ("group.name", "group_name"),
    ("priority", "sort_priority"),
    ("image", "image_name"),
    ("icon", "image_icon"),
    ("internal.health", "internal_health_check_enabled"),
    ("internal_health", "internal_health_check_enabled"),
    ("external.health", "external_health_check_enabled"),
    ("external_health", "external_health_check_enabled"),
    ("started", "started_at"),
];

pub const CANONICAL_FIELDS: &[&str] = &[
    "host",
    "container_name",
    "container_id",
    "internalurl",
    "externalurl",
    "docker_status",
    "stack_name",
    "group_name",
    "sort_priority",
    "image_name",
    "image_icon",
    "internal_health_check_enabled",
    "external_health_check_enabled",
    "started_at",
];

const BOOL_FIELDS: &[&str] = &[
    "internal_health_check_enabled",
    "external_health_check_enabled",
];

const INT_FIELDS: &[&str] = &["sort_priority"];

pub fn canonical_key(key: &str) -> Option<&'static str> {
    if let Some(canonical) = CANONICAL_FIELDS.iter().copied().find(|c| *c == key) {
        return Some(canonical);
    }
    FIELD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
}

/// Normalizes a raw registration body. Unknown keys are logged and dropped;
/// when both a canonical key and one of its aliases are present the canonical
/// key wins.
pub fn normalize_registration(raw: &Value) -> Result<RegistrationPayload, String> {
    let Value::Object(object) = raw else {
        return Err("registration body must be a JSON object".to_string());
    };

    let mut flat = Vec::new();
    flatten_into(&mut flat, None, object);

    let mut canonical = Map::new();
    let mut aliased = Vec::new();
    for (key, value) in flat {
        match canonical_key(&key) {
            Some(target) if target == key => {
                canonical.insert(target.to_string(), value);
            }
            Some(target) => aliased.push((target, value)),
            None => warn!(key = %key, "Ignoring unknown registration field."),
        }
    }
    for (target, value) in aliased {
        canonical.entry(target.to_string()).or_insert(value);
    }

    let coerced: Map<String, Value> = canonical
        .into_iter()
        .filter_map(|(key, value)| coerce(&key, value).map(|v| (key, v)))
        .collect();

    serde_json::from_value(Value::Object(coerced)).map_err(|e| e.to_string())
}

fn flatten_into(out: &mut Vec<(String, Value)>, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let full_key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(out, Some(&full_key), nested),
            other => out.push((full_key, other.clone())),
        }
    }
}

/// Brings a value into the shape its canonical field expects. `null` is
/// treated as absent.
fn coerce(key: &str, value: Value) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    if BOOL_FIELDS.contains(&key) {
        return Some(parse_bool(&value).map(Value::Bool).unwrap_or(value));
    }
    if INT_FIELDS.contains(&key) {
        if let Value::String(s) = &value {
            if let Ok(n) = s.trim().parse::<i64>() {
                return Some(Value::from(n));
            }
        }
        return Some(value);
    }
    match value {
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        other => Some(other),
    }
}

/// Accepts JSON booleans and the strings `true`/`false` (any case).
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
