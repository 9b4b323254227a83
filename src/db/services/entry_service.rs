//! Service entry persistence: the registration upsert used by container
//! agents, and the manual CRUD used by the admin API.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::entities::{prelude::*, service_entry, service_group};
use crate::db::services::group_service::get_or_create_group;
use crate::services::icon_resolver::IconResolver;
use crate::services::image_metadata::{ImageMetadata, parse_image};
use crate::web::models::entry_models::{
    EntryEdit, EntryFields, NewEntry, RegistrationPayload, ServiceEntryDetails,
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Created,
    Updated,
    SkippedStatic,
}

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("Missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Entry not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("Confirmation name does not match the container name")]
    ConfirmationMismatch,
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub async fn find_by_natural_key<C: ConnectionTrait>(
    conn: &C,
    host: &str,
    container_name: &str,
) -> Result<Option<service_entry::Model>, DbErr> {
    ServiceEntry::find()
        .filter(service_entry::Column::Host.eq(host))
        .filter(service_entry::Column::ContainerName.eq(container_name))
        .one(conn)
        .await
}

/// Creates or updates the entry identified by `(host, container_name)`.
///
/// Static entries are returned untouched. A create that loses the race
/// against a concurrent registration of the same key is retried once, which
/// turns it into an update.
pub async fn register(
    db: &DatabaseConnection,
    icons: &IconResolver,
    payload: RegistrationPayload,
) -> Result<(service_entry::Model, RegistrationOutcome), EntryError> {
    let (host, container_name) =
        require_natural_key(payload.host.as_deref(), payload.container_name.as_deref())?;

    match register_once(db, icons, &host, &container_name, &payload.fields).await {
        Err(EntryError::Database(e)) if is_unique_violation(&e) => {
            warn!(
                host = %host,
                container = %container_name,
                "Concurrent registration detected, retrying as update."
            );
            register_once(db, icons, &host, &container_name, &payload.fields).await
        }
        other => other,
    }
}

async fn register_once(
    db: &DatabaseConnection,
    icons: &IconResolver,
    host: &str,
    container_name: &str,
    fields: &EntryFields,
) -> Result<(service_entry::Model, RegistrationOutcome), EntryError> {
    let existing = find_by_natural_key(db, host, container_name).await?;
    if let Some(entry) = existing.as_ref().filter(|e| e.is_static) {
        info!(host = %host, container = %container_name, "Skipping registration for static entry.");
        return Ok((entry.clone(), RegistrationOutcome::SkippedStatic));
    }

    // Icon downloads happen before the transaction is opened.
    let resolved = if existing.is_none() || fields.touches_image() {
        Some(resolve_image(icons, fields, container_name).await)
    } else {
        None
    };

    write_registration(db, host, container_name, fields, resolved).await
}

/// Applies a registration inside one transaction. The update only matches
/// non-static rows, so an entry made static after the pre-check is skipped.
async fn write_registration(
    db: &DatabaseConnection,
    host: &str,
    container_name: &str,
    fields: &EntryFields,
    resolved: Option<(ImageMetadata, Option<String>)>,
) -> Result<(service_entry::Model, RegistrationOutcome), EntryError> {
    let now = Utc::now();
    let txn = db.begin().await?;

    match find_by_natural_key(&txn, host, container_name).await? {
        Some(entry) => {
            let mut changes = service_entry::ActiveModel {
                last_updated: Set(now),
                last_api_update: Set(Some(now)),
                ..Default::default()
            };
            apply_fields(&txn, &mut changes, fields).await?;
            if let Some((image, icon)) = resolved {
                apply_image(&mut changes, fields, image, icon);
            }

            let result = ServiceEntry::update_many()
                .set(changes)
                .filter(service_entry::Column::Id.eq(entry.id))
                .filter(service_entry::Column::IsStatic.eq(false))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                txn.rollback().await?;
                info!(host = %host, container = %container_name, "Entry became static, registration skipped.");
                return Ok((entry, RegistrationOutcome::SkippedStatic));
            }

            let updated = ServiceEntry::find_by_id(entry.id)
                .one(&txn)
                .await?
                .ok_or(EntryError::NotFound)?;
            txn.commit().await?;
            debug!(entry_id = updated.id, "Updated entry from registration.");
            Ok((updated, RegistrationOutcome::Updated))
        }
        None => {
            let group = get_or_create_group(&txn, group_name_or_default(fields)).await?;
            let (image, icon) = resolved.unwrap_or_default();
            let created = service_entry::ActiveModel {
                host: Set(host.to_string()),
                container_name: Set(container_name.to_string()),
                container_id: Set(fields.container_id.clone()),
                internalurl: Set(fields.internalurl.clone()),
                externalurl: Set(fields.externalurl.clone()),
                docker_status: Set(fields.docker_status.clone()),
                stack_name: Set(fields.stack_name.clone()),
                group_id: Set(Some(group.id)),
                sort_priority: Set(fields.sort_priority.unwrap_or(0)),
                image_registry: Set(image.registry),
                image_owner: Set(image.owner),
                image_name: Set(image.name),
                image_tag: Set(image.tag),
                image_icon: Set(icon),
                internal_health_check_enabled: Set(fields
                    .internal_health_check_enabled
                    .unwrap_or(false)),
                external_health_check_enabled: Set(fields
                    .external_health_check_enabled
                    .unwrap_or(false)),
                is_static: Set(false),
                started_at: Set(fields.started_at.clone()),
                last_updated: Set(now),
                last_api_update: Set(Some(now)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            txn.commit().await?;
            info!(host = %host, container = %container_name, entry_id = created.id, "Registered new entry.");
            Ok((created, RegistrationOutcome::Created))
        }
    }
}

/// Manual add. Fails with `Conflict` when the natural key is taken.
pub async fn create_entry(
    db: &DatabaseConnection,
    icons: &IconResolver,
    new_entry: NewEntry,
) -> Result<service_entry::Model, EntryError> {
    let (host, container_name) = require_natural_key(
        Some(new_entry.host.as_str()),
        Some(new_entry.container_name.as_str()),
    )?;
    if find_by_natural_key(db, &host, &container_name)
        .await?
        .is_some()
    {
        return Err(duplicate(&host, &container_name));
    }

    let edit = new_entry.edit;
    let (image, icon) = resolve_image(icons, &edit.fields, &container_name).await;

    let txn = db.begin().await?;
    let widget_id = if edit.clear_widget {
        None
    } else {
        checked_widget_id(&txn, edit.widget_id).await?
    };
    let group = get_or_create_group(&txn, group_name_or_default(&edit.fields)).await?;
    let fields = edit.fields;
    let inserted = service_entry::ActiveModel {
        host: Set(host.clone()),
        container_name: Set(container_name.clone()),
        container_id: Set(fields.container_id),
        internalurl: Set(fields.internalurl),
        externalurl: Set(fields.externalurl),
        docker_status: Set(fields.docker_status),
        stack_name: Set(fields.stack_name),
        group_id: Set(Some(group.id)),
        sort_priority: Set(fields.sort_priority.unwrap_or(0)),
        image_registry: Set(image.registry),
        image_owner: Set(image.owner),
        image_name: Set(image.name),
        image_tag: Set(image.tag),
        image_icon: Set(icon),
        internal_health_check_enabled: Set(fields.internal_health_check_enabled.unwrap_or(false)),
        external_health_check_enabled: Set(fields.external_health_check_enabled.unwrap_or(false)),
        is_static: Set(edit.is_static.unwrap_or(false)),
        started_at: Set(fields.started_at),
        last_updated: Set(Utc::now()),
        last_api_update: Set(None),
        widget_id: Set(widget_id),
        ..Default::default()
    }
    .insert(&txn)
    .await;

    let created = match inserted {
        Ok(created) => created,
        Err(e) if is_unique_violation(&e) => return Err(duplicate(&host, &container_name)),
        Err(e) => return Err(e.into()),
    };
    txn.commit().await?;
    info!(entry_id = created.id, host = %host, container = %container_name, "Created entry manually.");
    Ok(created)
}

/// Manual partial edit. Unlike registration this also applies to static
/// entries and leaves `last_api_update` alone.
pub async fn update_entry(
    db: &DatabaseConnection,
    icons: &IconResolver,
    entry_id: i32,
    edit: EntryEdit,
) -> Result<service_entry::Model, EntryError> {
    let entry = ServiceEntry::find_by_id(entry_id)
        .one(db)
        .await?
        .ok_or(EntryError::NotFound)?;

    let resolved = if edit.fields.touches_image() {
        Some(resolve_image(icons, &edit.fields, &entry.container_name).await)
    } else {
        None
    };

    let txn = db.begin().await?;
    let mut changes = service_entry::ActiveModel {
        id: Set(entry.id),
        last_updated: Set(Utc::now()),
        ..Default::default()
    };
    apply_fields(&txn, &mut changes, &edit.fields).await?;
    if let Some((image, icon)) = resolved {
        apply_image(&mut changes, &edit.fields, image, icon);
    }
    if let Some(is_static) = edit.is_static {
        changes.is_static = Set(is_static);
    }
    if edit.clear_widget {
        changes.widget_id = Set(None);
    } else if edit.widget_id.is_some() {
        changes.widget_id = Set(checked_widget_id(&txn, edit.widget_id).await?);
    }

    let updated = changes.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Deletes an entry once the caller has repeated its container name.
pub async fn delete_entry(
    db: &DatabaseConnection,
    entry_id: i32,
    confirm_name: &str,
) -> Result<service_entry::Model, EntryError> {
    let entry = ServiceEntry::find_by_id(entry_id)
        .one(db)
        .await?
        .ok_or(EntryError::NotFound)?;
    if confirm_name.trim() != entry.container_name {
        return Err(EntryError::ConfirmationMismatch);
    }
    ServiceEntry::delete_by_id(entry.id).exec(db).await?;
    info!(entry_id = entry.id, container = %entry.container_name, "Deleted entry.");
    Ok(entry)
}

pub async fn get_entry_details(
    db: &DatabaseConnection,
    entry_id: i32,
    now: DateTime<Utc>,
) -> Result<ServiceEntryDetails, EntryError> {
    let (entry, group) = ServiceEntry::find_by_id(entry_id)
        .find_also_related(ServiceGroup)
        .one(db)
        .await?
        .ok_or(EntryError::NotFound)?;
    Ok(ServiceEntryDetails::new(entry, group.as_ref(), now))
}

/// All entries in dashboard order: by group, then sort priority, then name.
pub async fn list_entries(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<ServiceEntryDetails>, DbErr> {
    let mut rows = ServiceEntry::find()
        .find_also_related(ServiceGroup)
        .all(db)
        .await?;
    rows.sort_by(|(a, ga), (b, gb)| {
        group_sort_key(ga.as_ref())
            .cmp(&group_sort_key(gb.as_ref()))
            .then(a.sort_priority.cmp(&b.sort_priority))
            .then_with(|| a.container_name.cmp(&b.container_name))
    });
    Ok(rows
        .into_iter()
        .map(|(entry, group)| ServiceEntryDetails::new(entry, group.as_ref(), now))
        .collect())
}

/// The ungrouped sentinel always sorts after user-defined groups.
fn group_sort_key(group: Option<&service_group::Model>) -> (bool, i32, &str) {
    match group {
        Some(g) => (
            g.name == service_group::UNGROUPED,
            g.sort_priority,
            g.name.as_str(),
        ),
        None => (true, i32::MAX, service_group::UNGROUPED),
    }
}

fn require_natural_key(
    host: Option<&str>,
    container_name: Option<&str>,
) -> Result<(String, String), EntryError> {
    let host = host.map(str::trim).filter(|s| !s.is_empty());
    let container_name = container_name.map(str::trim).filter(|s| !s.is_empty());
    match (host, container_name) {
        (Some(host), Some(container_name)) => Ok((host.to_string(), container_name.to_string())),
        (host, container_name) => {
            let mut missing = Vec::new();
            if host.is_none() {
                missing.push("host");
            }
            if container_name.is_none() {
                missing.push("container_name");
            }
            Err(EntryError::MissingFields(missing))
        }
    }
}

fn duplicate(host: &str, container_name: &str) -> EntryError {
    EntryError::Conflict(format!(
        "An entry for '{container_name}' on '{host}' already exists"
    ))
}

fn group_name_or_default(fields: &EntryFields) -> &str {
    fields
        .group_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(service_group::UNGROUPED)
}

async fn resolve_image(
    icons: &IconResolver,
    fields: &EntryFields,
    container_name: &str,
) -> (ImageMetadata, Option<String>) {
    let image = parse_image(fields.image_name.as_deref(), Some(container_name));
    let icon = icons
        .resolve_for_image(&image, Some(container_name), fields.image_icon.as_deref())
        .await;
    (image, icon)
}

async fn checked_widget_id<C: ConnectionTrait>(
    conn: &C,
    widget_id: Option<i32>,
) -> Result<Option<i32>, EntryError> {
    let Some(widget_id) = widget_id else {
        return Ok(None);
    };
    match Widget::find_by_id(widget_id).one(conn).await? {
        Some(widget) => Ok(Some(widget.id)),
        None => Err(EntryError::InvalidPayload(format!(
            "widget {widget_id} does not exist"
        ))),
    }
}

/// Copies the present fields onto `changes`, creating the group if needed.
async fn apply_fields<C: ConnectionTrait>(
    conn: &C,
    changes: &mut service_entry::ActiveModel,
    fields: &EntryFields,
) -> Result<(), DbErr> {
    if let Some(v) = &fields.container_id {
        changes.container_id = Set(Some(v.clone()));
    }
    if let Some(v) = &fields.internalurl {
        changes.internalurl = Set(Some(v.clone()));
    }
    if let Some(v) = &fields.externalurl {
        changes.externalurl = Set(Some(v.clone()));
    }
    if let Some(v) = &fields.docker_status {
        changes.docker_status = Set(Some(v.clone()));
    }
    if let Some(v) = &fields.stack_name {
        changes.stack_name = Set(Some(v.clone()));
    }
    if let Some(v) = &fields.started_at {
        changes.started_at = Set(Some(v.clone()));
    }
    if let Some(v) = fields.sort_priority {
        changes.sort_priority = Set(v);
    }
    if let Some(v) = fields.internal_health_check_enabled {
        changes.internal_health_check_enabled = Set(v);
    }
    if let Some(v) = fields.external_health_check_enabled {
        changes.external_health_check_enabled = Set(v);
    }
    if let Some(name) = fields
        .group_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let group = get_or_create_group(conn, name).await?;
        changes.group_id = Set(Some(group.id));
    }
    Ok(())
}

/// Image columns follow the payload's image reference; a failed icon lookup
/// keeps whatever icon the entry already has.
fn apply_image(
    changes: &mut service_entry::ActiveModel,
    fields: &EntryFields,
    image: ImageMetadata,
    icon: Option<String>,
) {
    if fields.image_name.is_some() {
        changes.image_registry = Set(image.registry);
        changes.image_owner = Set(image.owner);
        changes.image_name = Set(image.name);
        changes.image_tag = Set(image.tag);
    }
    if let Some(icon) = icon {
        changes.image_icon = Set(Some(icon));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;
    use chrono::Duration;
    use sea_orm::PaginatorTrait;

    fn offline_resolver(dir: &std::path::Path) -> IconResolver {
        IconResolver::new(
            dir,
            vec!["http://127.0.0.1:1/svg".to_string()],
            Duration::minutes(60),
        )
        .unwrap()
    }

    fn payload(host: &str, container: &str, fields: EntryFields) -> RegistrationPayload {
        RegistrationPayload {
            host: Some(host.to_string()),
            container_name: Some(container.to_string()),
            fields,
        }
    }

    #[tokio::test]
    async fn test_register_creates_entry_with_defaults() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());

        let (entry, outcome) = register(
            &db,
            &icons,
            payload(
                "h1",
                "app1",
                EntryFields {
                    image_name: Some("ghcr.io/acme/app1:v2".to_string()),
                    ..Default::default()
                },
            ),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RegistrationOutcome::Created);
        assert_eq!(entry.image_registry.as_deref(), Some("ghcr.io"));
        assert_eq!(entry.image_owner.as_deref(), Some("acme"));
        assert_eq!(entry.image_name.as_deref(), Some("app1"));
        assert_eq!(entry.image_tag.as_deref(), Some("v2"));
        assert_eq!(entry.image_icon, None);
        assert!(!entry.is_static);
        assert!(!entry.internal_health_check_enabled);
        assert!(entry.last_api_update.is_some());

        let group = ServiceGroup::find_by_id(entry.group_id.unwrap())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.name, service_group::UNGROUPED);
    }

    #[tokio::test]
    async fn test_register_requires_natural_key() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());

        let err = register(
            &db,
            &icons,
            RegistrationPayload {
                host: Some("  ".to_string()),
                container_name: None,
                fields: EntryFields::default(),
            },
        )
        .await
        .unwrap_err();
        match err {
            EntryError::MissingFields(missing) => {
                assert_eq!(missing, vec!["host", "container_name"])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ServiceEntry::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_static_entry_is_left_untouched() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());

        let (entry, _) = register(&db, &icons, payload("h1", "app1", EntryFields::default()))
            .await
            .unwrap();
        update_entry(
            &db,
            &icons,
            entry.id,
            EntryEdit {
                is_static: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let before = ServiceEntry::find_by_id(entry.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();

        let (_, outcome) = register(
            &db,
            &icons,
            payload(
                "h1",
                "app1",
                EntryFields {
                    docker_status: Some("exited".to_string()),
                    image_name: Some("nginx:latest".to_string()),
                    group_name: Some("media".to_string()),
                    ..Default::default()
                },
            ),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RegistrationOutcome::SkippedStatic);
        let after = ServiceEntry::find_by_id(entry.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before, after);
        assert!(
            group_service_find(&db, "media").await.is_none(),
            "skipped registration must not create groups"
        );
    }

    async fn group_service_find(
        db: &DatabaseConnection,
        name: &str,
    ) -> Option<service_group::Model> {
        crate::db::services::group_service::find_group_by_name(db, name)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_partial_update_touches_only_present_fields() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());

        let (before, _) = register(
            &db,
            &icons,
            payload(
                "h1",
                "app1",
                EntryFields {
                    internalurl: Some("http://10.0.0.2:8080".to_string()),
                    docker_status: Some("running".to_string()),
                    group_name: Some("media".to_string()),
                    image_name: Some("acme/app1:v1".to_string()),
                    internal_health_check_enabled: Some(true),
                    ..Default::default()
                },
            ),
        )
        .await
        .unwrap();

        let (after, outcome) = register(
            &db,
            &icons,
            payload(
                "h1",
                "app1",
                EntryFields {
                    docker_status: Some("exited".to_string()),
                    ..Default::default()
                },
            ),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RegistrationOutcome::Updated);
        assert_eq!(after.docker_status.as_deref(), Some("exited"));
        assert!(after.last_updated >= before.last_updated);

        let mut expected = before.clone();
        expected.docker_status = after.docker_status.clone();
        expected.last_updated = after.last_updated;
        expected.last_api_update = after.last_api_update;
        assert_eq!(after, expected);
    }

    #[tokio::test]
    async fn test_entry_made_static_mid_registration_is_skipped() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());
        let (entry, _) = register(&db, &icons, payload("h1", "app1", EntryFields::default()))
            .await
            .unwrap();

        // An admin pins the entry after the registration's pre-check passed.
        ServiceEntry::update_many()
            .col_expr(
                service_entry::Column::IsStatic,
                sea_orm::sea_query::Expr::value(true),
            )
            .filter(service_entry::Column::Id.eq(entry.id))
            .exec(&db)
            .await
            .unwrap();
        let pinned = ServiceEntry::find_by_id(entry.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();

        let fields = EntryFields {
            docker_status: Some("exited".to_string()),
            group_name: Some("late-group".to_string()),
            ..Default::default()
        };
        let (_, outcome) = write_registration(&db, "h1", "app1", &fields, None)
            .await
            .unwrap();

        assert_eq!(outcome, RegistrationOutcome::SkippedStatic);
        let after = ServiceEntry::find_by_id(entry.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after, pinned);
        assert!(group_service_find(&db, "late-group").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("data/services.db").display()
        );
        let db = crate::db::connect(&url).await.unwrap();
        crate::db::ensure_schema(&db).await.unwrap();
        let icons = std::sync::Arc::new(offline_resolver(&dir.path().join("images")));

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let db = db.clone();
                let icons = icons.clone();
                tokio::spawn(async move {
                    let fields = EntryFields {
                        docker_status: Some(format!("running-{i}")),
                        group_name: Some(format!("group-{}", i % 3)),
                        ..Default::default()
                    };
                    register(&db, &icons, payload("h1", &format!("app{}", i % 8), fields)).await
                })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok(), "registration failed: {:?}", result.err());
        }
        assert_eq!(ServiceEntry::find().count(&db).await.unwrap(), 8);
        assert_eq!(ServiceGroup::find().count(&db).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_register_creates_named_group_lazily() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());

        let fields = EntryFields {
            group_name: Some("media".to_string()),
            ..Default::default()
        };
        let (a, _) = register(&db, &icons, payload("h1", "radarr", fields.clone()))
            .await
            .unwrap();
        let (b, _) = register(&db, &icons, payload("h1", "sonarr", fields))
            .await
            .unwrap();

        assert_eq!(a.group_id, b.group_id);
        assert_eq!(ServiceGroup::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_explicit_icon_is_kept_when_download_fails() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());

        let (entry, _) = register(
            &db,
            &icons,
            payload(
                "h1",
                "app1",
                EntryFields {
                    image_icon: Some("custom.svg".to_string()),
                    ..Default::default()
                },
            ),
        )
        .await
        .unwrap();
        assert_eq!(entry.image_icon.as_deref(), Some("custom.svg"));
    }

    #[tokio::test]
    async fn test_natural_key_is_unique_in_storage() {
        let db = setup_db().await;
        let new_row = || service_entry::ActiveModel {
            host: Set("h1".to_string()),
            container_name: Set("app1".to_string()),
            sort_priority: Set(0),
            internal_health_check_enabled: Set(false),
            external_health_check_enabled: Set(false),
            is_static: Set(false),
            last_updated: Set(Utc::now()),
            ..Default::default()
        };
        new_row().insert(&db).await.unwrap();
        let err = new_row().insert(&db).await.unwrap_err();
        assert!(is_unique_violation(&err), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_manual_create_rejects_duplicate() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());
        let new_entry = || NewEntry {
            host: "h1".to_string(),
            container_name: "app1".to_string(),
            edit: EntryEdit {
                is_static: Some(true),
                ..Default::default()
            },
        };

        let created = create_entry(&db, &icons, new_entry()).await.unwrap();
        assert!(created.is_static);
        assert_eq!(created.last_api_update, None);
        assert!(matches!(
            create_entry(&db, &icons, new_entry()).await,
            Err(EntryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_matching_name() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());
        let (entry, _) = register(&db, &icons, payload("h1", "app1", EntryFields::default()))
            .await
            .unwrap();

        assert!(matches!(
            delete_entry(&db, entry.id, "app2").await,
            Err(EntryError::ConfirmationMismatch)
        ));
        delete_entry(&db, entry.id, "app1").await.unwrap();
        assert!(matches!(
            delete_entry(&db, entry.id, "app1").await,
            Err(EntryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_entries_orders_by_group_then_priority() {
        let db = setup_db().await;
        let dir = tempfile::tempdir().unwrap();
        let icons = offline_resolver(dir.path());
        crate::db::services::group_service::create_group(&db, "infra", 1, None)
            .await
            .unwrap();

        for (name, group, priority) in [
            ("zeta", None, 0),
            ("beta", Some("infra"), 2),
            ("alpha", Some("infra"), 2),
            ("first", Some("infra"), 1),
        ] {
            register(
                &db,
                &icons,
                payload(
                    "h1",
                    name,
                    EntryFields {
                        group_name: group.map(String::from),
                        sort_priority: Some(priority),
                        ..Default::default()
                    },
                ),
            )
            .await
            .unwrap();
        }

        let now = Utc::now();
        let names: Vec<String> = list_entries(&db, now)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.entry.container_name)
            .collect();
        assert_eq!(names, vec!["first", "alpha", "beta", "zeta"]);
    }
}
