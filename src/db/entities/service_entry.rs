use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registrations older than this mark a non-static entry as stale.
pub const STALE_AFTER_MINUTES: i64 = 5;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub host: String,
    pub container_name: String,
    pub container_id: Option<String>,
    pub internalurl: Option<String>,
    pub externalurl: Option<String>,
    pub docker_status: Option<String>,
    pub stack_name: Option<String>,
    pub group_id: Option<i32>,
    pub sort_priority: i32,
    pub image_registry: Option<String>,
    pub image_owner: Option<String>,
    pub image_name: Option<String>,
    pub image_tag: Option<String>,
    pub image_icon: Option<String>,
    pub internal_health_check_enabled: bool,
    pub internal_health_check_status: Option<String>,
    pub internal_health_check_update: Option<ChronoDateTimeUtc>,
    pub external_health_check_enabled: bool,
    pub external_health_check_status: Option<String>,
    pub external_health_check_update: Option<ChronoDateTimeUtc>,
    pub is_static: bool,
    pub started_at: Option<String>,
    pub last_updated: ChronoDateTimeUtc,
    pub last_api_update: Option<ChronoDateTimeUtc>,
    pub widget_id: Option<i32>,
}

impl Model {
    /// A non-static entry is stale when the registration API has not touched it
    /// for more than [`STALE_AFTER_MINUTES`]. Entries never registered through the
    /// API are not considered stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if self.is_static {
            return false;
        }
        match self.last_api_update {
            Some(at) => now - at > Duration::minutes(STALE_AFTER_MINUTES),
            None => false,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service_group::Entity",
        from = "Column::GroupId",
        to = "super::service_group::Column::Id",
        on_delete = "Restrict"
    )]
    ServiceGroup,

    #[sea_orm(
        belongs_to = "super::widget::Entity",
        from = "Column::WidgetId",
        to = "super::widget::Column::Id",
        on_delete = "SetNull"
    )]
    Widget,
}

impl Related<super::service_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceGroup.def()
    }
}

impl Related<super::widget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Widget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
