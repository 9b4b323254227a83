//! YAML backups of the service table: export, restore, retention and the
//! nightly schedule.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Timelike, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::db::entities::{prelude::*, service_entry, service_group, widget};
use crate::db::services::entry_service::{find_by_natural_key, list_entries};
use crate::db::services::group_service::get_or_create_group;
use crate::db::services::widget_service::find_widget_by_name;

const FILE_PREFIX: &str = "backup_";
const FILE_SUFFIX: &str = ".yml";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Invalid backup filename: {0}")]
    InvalidFilename(String),
    #[error("Backup not found: {0}")]
    NotFound(String),
}

/// One entry as written to a backup file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub host: String,
    pub container_name: String,
    pub container_id: Option<String>,
    pub internalurl: Option<String>,
    pub externalurl: Option<String>,
    pub docker_status: Option<String>,
    pub stack_name: Option<String>,
    pub group_name: Option<String>,
    #[serde(default)]
    pub sort_priority: i32,
    pub image_registry: Option<String>,
    pub image_owner: Option<String>,
    pub image_name: Option<String>,
    pub image_tag: Option<String>,
    pub image_icon: Option<String>,
    #[serde(default)]
    pub internal_health_check_enabled: bool,
    #[serde(default)]
    pub external_health_check_enabled: bool,
    #[serde(default)]
    pub is_static: bool,
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<BackupWidget>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BackupWidget {
    pub widget_name: String,
    pub widget_type: String,
    pub widget_url: String,
    pub widget_api_key: Option<String>,
    #[serde(default)]
    pub widget_fields: Vec<String>,
}

impl From<&widget::Model> for BackupWidget {
    fn from(w: &widget::Model) -> Self {
        Self {
            widget_name: w.widget_name.clone(),
            widget_type: w.widget_type.clone(),
            widget_url: w.widget_url.clone(),
            widget_api_key: w.widget_api_key.clone(),
            widget_fields: w.requested_fields(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct BackupFileInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub created: usize,
    pub updated: usize,
}

pub struct BackupService {
    db: DatabaseConnection,
    backup_dir: PathBuf,
    retention_days: i64,
}

impl BackupService {
    pub fn new(db: DatabaseConnection, backup_dir: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            db,
            backup_dir: backup_dir.into(),
            retention_days,
        }
    }

    pub async fn export_backup(&self) -> Result<String, BackupError> {
        self.export_backup_at(Utc::now()).await
    }

    /// Writes every entry, in dashboard order, to `backup_<timestamp>.yml`
    /// and returns the filename.
    pub async fn export_backup_at(&self, now: DateTime<Utc>) -> Result<String, BackupError> {
        let widgets: HashMap<i32, widget::Model> = Widget::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect();

        let records: Vec<BackupRecord> = list_entries(&self.db, now)
            .await?
            .into_iter()
            .map(|details| {
                let e = details.entry;
                BackupRecord {
                    widget: e.widget_id.and_then(|id| widgets.get(&id)).map(BackupWidget::from),
                    host: e.host,
                    container_name: e.container_name,
                    container_id: e.container_id,
                    internalurl: e.internalurl,
                    externalurl: e.externalurl,
                    docker_status: e.docker_status,
                    stack_name: e.stack_name,
                    group_name: details.group_name,
                    sort_priority: e.sort_priority,
                    image_registry: e.image_registry,
                    image_owner: e.image_owner,
                    image_name: e.image_name,
                    image_tag: e.image_tag,
                    image_icon: e.image_icon,
                    internal_health_check_enabled: e.internal_health_check_enabled,
                    external_health_check_enabled: e.external_health_check_enabled,
                    is_static: e.is_static,
                    started_at: e.started_at,
                }
            })
            .collect();

        let filename = format!("{FILE_PREFIX}{}{FILE_SUFFIX}", now.format(TIMESTAMP_FORMAT));
        let yaml = serde_yaml::to_string(&records)?;
        tokio::fs::create_dir_all(&self.backup_dir).await?;
        tokio::fs::write(self.backup_dir.join(&filename), yaml).await?;

        info!(file = %filename, entries = records.len(), "Backup written.");
        Ok(filename)
    }

    /// Backup files, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupFileInfo>, BackupError> {
        let mut backups = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };
        while let Some(item) = dir.next_entry().await? {
            let filename = item.file_name().to_string_lossy().into_owned();
            if !is_backup_filename(&filename) {
                continue;
            }
            let size_bytes = item.metadata().await?.len();
            backups.push(BackupFileInfo {
                created_at: backup_timestamp(&filename),
                filename,
                size_bytes,
            });
        }
        backups.sort_by(|a, b| b.filename.cmp(&a.filename));
        Ok(backups)
    }

    /// Deletes backups whose timestamp is older than the retention window.
    pub async fn prune_backups(&self, now: DateTime<Utc>) -> Result<Vec<String>, BackupError> {
        let cutoff = now - ChronoDuration::days(self.retention_days);
        let mut removed = Vec::new();
        for backup in self.list_backups().await? {
            let Some(created_at) = backup.created_at else {
                continue;
            };
            if created_at < cutoff {
                tokio::fs::remove_file(self.backup_dir.join(&backup.filename)).await?;
                info!(file = %backup.filename, "Pruned old backup.");
                removed.push(backup.filename);
            }
        }
        Ok(removed)
    }

    /// Upserts every record of a backup by `(host, container_name)`. Groups
    /// and widgets are matched by name and created when missing. Static
    /// entries are restored as written.
    pub async fn restore_backup(&self, filename: &str) -> Result<RestoreSummary, BackupError> {
        if !is_backup_filename(filename) {
            return Err(BackupError::InvalidFilename(filename.to_string()));
        }
        let path = self.backup_dir.join(filename);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackupError::NotFound(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let records: Vec<BackupRecord> = serde_yaml::from_str(&contents)?;

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let mut summary = RestoreSummary::default();
        for record in records {
            let group_name = record
                .group_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(service_group::UNGROUPED);
            let group = get_or_create_group(&txn, group_name).await?;
            let widget_id = match &record.widget {
                Some(w) => Some(restore_widget(&txn, w).await?),
                None => None,
            };

            match find_by_natural_key(&txn, &record.host, &record.container_name).await? {
                Some(existing) => {
                    let mut entry: service_entry::ActiveModel = existing.into();
                    fill_from_record(&mut entry, &record, group.id, widget_id, now);
                    entry.update(&txn).await?;
                    summary.updated += 1;
                }
                None => {
                    let mut entry = service_entry::ActiveModel {
                        host: Set(record.host.clone()),
                        container_name: Set(record.container_name.clone()),
                        last_api_update: Set(None),
                        ..Default::default()
                    };
                    fill_from_record(&mut entry, &record, group.id, widget_id, now);
                    entry.insert(&txn).await?;
                    summary.created += 1;
                }
            }
        }
        txn.commit().await?;

        info!(file = %filename, created = summary.created, updated = summary.updated, "Backup restored.");
        Ok(summary)
    }

    /// Exports and prunes once a day at `hour` (UTC) until shutdown.
    pub async fn start_nightly(self: Arc<Self>, hour: u32, mut shutdown_rx: watch::Receiver<()>) {
        info!(hour, "Nightly backup scheduler started.");
        loop {
            let wait = duration_until_next_run(Utc::now(), hour);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    match self.export_backup().await {
                        Ok(_) => {
                            if let Err(e) = self.prune_backups(Utc::now()).await {
                                warn!(error = %e, "Failed to prune old backups.");
                            }
                        }
                        Err(e) => error!(error = %e, "Nightly backup failed."),
                    }
                },
                _ = shutdown_rx.changed() => {
                    info!("Nightly backup scheduler shutting down.");
                    break;
                }
            }
        }
    }
}

async fn restore_widget<C: ConnectionTrait>(conn: &C, w: &BackupWidget) -> Result<i32, DbErr> {
    if let Some(existing) = find_widget_by_name(conn, &w.widget_name).await? {
        return Ok(existing.id);
    }
    let created = widget::ActiveModel {
        widget_name: Set(w.widget_name.clone()),
        widget_type: Set(w.widget_type.clone()),
        widget_url: Set(w.widget_url.clone()),
        widget_api_key: Set(w.widget_api_key.clone()),
        widget_fields: Set(serde_json::json!(w.widget_fields)),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(created.id)
}

fn fill_from_record(
    entry: &mut service_entry::ActiveModel,
    record: &BackupRecord,
    group_id: i32,
    widget_id: Option<i32>,
    now: DateTime<Utc>,
) {
    entry.container_id = Set(record.container_id.clone());
    entry.internalurl = Set(record.internalurl.clone());
    entry.externalurl = Set(record.externalurl.clone());
    entry.docker_status = Set(record.docker_status.clone());
    entry.stack_name = Set(record.stack_name.clone());
    entry.group_id = Set(Some(group_id));
    entry.sort_priority = Set(record.sort_priority);
    entry.image_registry = Set(record.image_registry.clone());
    entry.image_owner = Set(record.image_owner.clone());
    entry.image_name = Set(record.image_name.clone());
    entry.image_tag = Set(record.image_tag.clone());
    entry.image_icon = Set(record.image_icon.clone());
    entry.internal_health_check_enabled = Set(record.internal_health_check_enabled);
    entry.external_health_check_enabled = Set(record.external_health_check_enabled);
    entry.is_static = Set(record.is_static);
    entry.started_at = Set(record.started_at.clone());
    entry.widget_id = Set(widget_id);
    entry.last_updated = Set(now);
}

fn is_backup_filename(name: &str) -> bool {
    name.starts_with(FILE_PREFIX)
        && name.ends_with(FILE_SUFFIX)
        && !name.contains(['/', '\\'])
}

fn backup_timestamp(filename: &str) -> Option<DateTime<Utc>> {
    let stamp = filename
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Time from `now` until the next `hour:00:00` UTC.
pub fn duration_until_next_run(now: DateTime<Utc>, hour: u32) -> std::time::Duration {
    let today = now
        .with_hour(hour.min(23))
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let next = if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}
