use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "widgets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub widget_name: String,
    /// Key into the fetcher registry, e.g. `radarr`.
    pub widget_type: String,
    pub widget_url: String,
    #[serde(skip_serializing)]
    pub widget_api_key: Option<String>,
    /// JSON array of requested field keys.
    #[sea_orm(column_type = "Json")]
    pub widget_fields: Json,
}

impl Model {
    pub fn requested_fields(&self) -> Vec<String> {
        self.widget_fields
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::widget_value::Entity")]
    WidgetValue,

    #[sea_orm(has_many = "super::service_entry::Entity")]
    ServiceEntry,
}

impl Related<super::widget_value::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WidgetValue.def()
    }
}

impl Related<super::service_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
