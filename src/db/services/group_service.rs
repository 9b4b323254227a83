use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::db::entities::{prelude::*, service_entry, service_group};

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("Group not found")]
    NotFound,
    #[error("A group named '{0}' already exists")]
    AlreadyExists(String),
    #[error("Group still has {0} member(s)")]
    NotEmpty(u64),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Serialize, Debug, Clone)]
pub struct GroupWithCount {
    #[serde(flatten)]
    pub group: service_group::Model,
    pub entry_count: u64,
}

pub async fn find_group_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<service_group::Model>, DbErr> {
    ServiceGroup::find()
        .filter(service_group::Column::Name.eq(name))
        .one(conn)
        .await
}

/// Looks a group up by name, creating it on first reference.
pub async fn get_or_create_group<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<service_group::Model, DbErr> {
    if let Some(group) = find_group_by_name(conn, name).await? {
        return Ok(group);
    }
    let group = service_group::ActiveModel {
        name: Set(name.to_string()),
        sort_priority: Set(0),
        icon: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    info!(group = %group.name, group_id = group.id, "Created group.");
    Ok(group)
}

pub async fn list_groups_with_counts(db: &DatabaseConnection) -> Result<Vec<GroupWithCount>, DbErr> {
    let groups = ServiceGroup::find()
        .order_by_asc(service_group::Column::SortPriority)
        .order_by_asc(service_group::Column::Name)
        .all(db)
        .await?;

    let mut result = Vec::with_capacity(groups.len());
    for group in groups {
        let entry_count = count_members(db, group.id).await?;
        result.push(GroupWithCount { group, entry_count });
    }
    Ok(result)
}

pub async fn create_group(
    db: &DatabaseConnection,
    name: &str,
    sort_priority: i32,
    icon: Option<String>,
) -> Result<service_group::Model, GroupError> {
    let name = name.trim();
    if find_group_by_name(db, name).await?.is_some() {
        return Err(GroupError::AlreadyExists(name.to_string()));
    }
    let group = service_group::ActiveModel {
        name: Set(name.to_string()),
        sort_priority: Set(sort_priority),
        icon: Set(icon),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(group)
}

/// Deletes a group that no entry references anymore.
pub async fn delete_group(db: &DatabaseConnection, group_id: i32) -> Result<(), GroupError> {
    let group = ServiceGroup::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or(GroupError::NotFound)?;

    let members = count_members(db, group.id).await?;
    if members > 0 {
        return Err(GroupError::NotEmpty(members));
    }

    ServiceGroup::delete_by_id(group.id).exec(db).await?;
    info!(group = %group.name, "Deleted group.");
    Ok(())
}

async fn count_members<C: ConnectionTrait>(conn: &C, group_id: i32) -> Result<u64, DbErr> {
    ServiceEntry::find()
        .filter(service_entry::Column::GroupId.eq(group_id))
        .count(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;

    #[tokio::test]
    async fn test_get_or_create_is_lazy_and_idempotent() {
        let db = setup_db().await;
        let first = get_or_create_group(&db, "media").await.unwrap();
        let second = get_or_create_group(&db, "media").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(ServiceGroup::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_group_rejects_duplicates() {
        let db = setup_db().await;
        create_group(&db, "infra", 1, None).await.unwrap();
        assert!(matches!(
            create_group(&db, "infra", 2, None).await,
            Err(GroupError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_group_requires_no_members() {
        let db = setup_db().await;
        let group = get_or_create_group(&db, "media").await.unwrap();
        let entry = service_entry::ActiveModel {
            host: Set("h1".to_string()),
            container_name: Set("app".to_string()),
            group_id: Set(Some(group.id)),
            sort_priority: Set(0),
            internal_health_check_enabled: Set(false),
            external_health_check_enabled: Set(false),
            is_static: Set(false),
            last_updated: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        assert!(matches!(
            delete_group(&db, group.id).await,
            Err(GroupError::NotEmpty(1))
        ));

        ServiceEntry::delete_by_id(entry.id).exec(&db).await.unwrap();
        delete_group(&db, group.id).await.unwrap();
        assert!(matches!(
            delete_group(&db, group.id).await,
            Err(GroupError::NotFound)
        ));
    }
}
