use serde::{Deserialize, Serialize};

/// Structured form of a `registry/owner/name:tag` image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub registry: Option<String>,
    pub owner: Option<String>,
    pub name: Option<String>,
    pub tag: Option<String>,
}

/// Parses an image reference, falling back to `fallback_name` when the raw
/// string is absent or empty.
///
/// The tag is everything after the first `:`. A registry that carries a port
/// (`registry:5000/owner/name:tag`) is therefore split at the port, leaving
/// `registry` as the only base segment and `5000/owner/name:tag` as the tag.
pub fn parse_image(raw: Option<&str>, fallback_name: Option<&str>) -> ImageMetadata {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return ImageMetadata {
            name: fallback_name.map(String::from),
            ..Default::default()
        };
    };

    let (base, tag) = match raw.split_once(':') {
        Some((base, tag)) => (base, Some(tag.to_string())),
        None => (raw, None),
    };

    let parts: Vec<&str> = base.split('/').collect();
    let (registry, owner, name) = match parts.as_slice() {
        [registry, owner, name] => (
            Some(registry.to_string()),
            Some(owner.to_string()),
            Some(name.to_string()),
        ),
        [owner, name] => (None, Some(owner.to_string()), Some(name.to_string())),
        [name] => (None, None, Some(name.to_string())),
        // Deeper paths (registry/org/team/name) are left unparsed.
        _ => (None, None, None),
    };

    ImageMetadata {
        registry,
        owner,
        name,
        tag,
    }
}
