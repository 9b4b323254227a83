use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::entities::{service_entry, service_group};

/// Optional entry attributes shared by the registration API and manual edits.
/// Absent fields leave the stored value untouched.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub container_id: Option<String>,
    pub internalurl: Option<String>,
    pub externalurl: Option<String>,
    pub docker_status: Option<String>,
    pub stack_name: Option<String>,
    pub group_name: Option<String>,
    pub sort_priority: Option<i32>,
    /// Raw image reference, e.g. `ghcr.io/acme/app:v2`.
    pub image_name: Option<String>,
    /// Explicit icon filename overriding the one derived from the image.
    pub image_icon: Option<String>,
    pub internal_health_check_enabled: Option<bool>,
    pub external_health_check_enabled: Option<bool>,
    pub started_at: Option<String>,
}

impl EntryFields {
    pub fn touches_image(&self) -> bool {
        self.image_name.is_some() || self.image_icon.is_some()
    }
}

/// A `/api/register` body after alias normalization.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RegistrationPayload {
    pub host: Option<String>,
    pub container_name: Option<String>,
    #[serde(flatten)]
    pub fields: EntryFields,
}

/// Manual edit of an entry. Unlike registration it may toggle the static lock
/// and attach or detach a widget.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct EntryEdit {
    #[serde(flatten)]
    pub fields: EntryFields,
    pub is_static: Option<bool>,
    pub widget_id: Option<i32>,
    #[serde(default)]
    pub clear_widget: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewEntry {
    pub host: String,
    pub container_name: String,
    #[serde(flatten)]
    pub edit: EntryEdit,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeleteEntryRequest {
    pub confirm_name: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ServiceEntryDetails {
    #[serde(flatten)]
    pub entry: service_entry::Model,
    pub group_name: Option<String>,
    pub stale: bool,
}

impl ServiceEntryDetails {
    pub fn new(
        entry: service_entry::Model,
        group: Option<&service_group::Model>,
        now: DateTime<Utc>,
    ) -> Self {
        let stale = entry.is_stale(now);
        Self {
            entry,
            group_name: group.map(|g| g.name.clone()),
            stale,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateGroupRequest {
    pub name: String,
    pub sort_priority: Option<i32>,
    pub icon: Option<String>,
}
