use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Name of the group entries fall into when none is given. Sorts after
/// every user-defined group.
pub const UNGROUPED: &str = "zz_none";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub sort_priority: i32,
    pub icon: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::service_entry::Entity")]
    ServiceEntry,
}

impl Related<super::service_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
