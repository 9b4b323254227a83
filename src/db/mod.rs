pub mod entities;
pub mod services;

use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::db::entities::{prelude::*, service_entry};

/// Opens the connection pool for `database_url`, creating the parent
/// directory of a SQLite database file if needed.
///
/// SQLite gets a single pooled connection. Writers then queue on the pool
/// instead of failing with `SQLITE_BUSY` when a read transaction tries to
/// upgrade to a write while another writer holds the lock.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    if let Some(dir) = sqlite_parent_dir(database_url) {
        std::fs::create_dir_all(&dir)
            .map_err(|e| DbErr::Custom(format!("Failed to create {}: {e}", dir.display())))?;
    }
    let max_connections = if is_sqlite(database_url) { 1 } else { 10 };
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);
    Database::connect(opt).await
}

fn is_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

fn sqlite_parent_dir(database_url: &str) -> Option<PathBuf> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Creates any missing tables and the natural-key index on service entries.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, ServiceGroup).await?;
    create_table(db, &schema, Widget).await?;
    create_table(db, &schema, ServiceEntry).await?;
    create_table(db, &schema, WidgetValue).await?;

    let natural_key = Index::create()
        .name("idx_service_entries_host_container")
        .table(ServiceEntry)
        .col(service_entry::Column::Host)
        .col(service_entry::Column::ContainerName)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&natural_key)).await?;

    info!("Database schema ensured.");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let stmt = schema
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
