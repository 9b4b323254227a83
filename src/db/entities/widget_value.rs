use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "widget_values")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub widget_id: i32,
    pub widget_value_key: String,
    pub widget_value: Option<String>,
    pub last_updated: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::widget::Entity",
        from = "Column::WidgetId",
        to = "super::widget::Column::Id",
        on_delete = "Cascade"
    )]
    Widget,
}

impl Related<super::widget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Widget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
