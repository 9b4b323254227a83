//! Periodic internal/external URL probes for service entries.

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::db::entities::{prelude::*, service_entry};
use crate::services::delayed_ticker;

/// Upper bound on probes in flight during one pass.
const PROBE_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeTarget {
    Internal,
    External,
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub entry_id: i32,
    pub target: ProbeTarget,
    /// Numeric status code, or `Error: <Kind>`.
    pub status: String,
    pub checked_at: DateTime<Utc>,
}

pub struct HealthCheckService {
    db: DatabaseConnection,
    client: reqwest::Client,
}

impl HealthCheckService {
    pub fn new(db: DatabaseConnection, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { db, client })
    }

    /// Runs one pass over every entry with an enabled probe. Probe failures
    /// are recorded as status strings; only the final commit can fail.
    pub async fn run_pass(&self) -> Result<Vec<ProbeResult>, DbErr> {
        let entries = ServiceEntry::find()
            .filter(
                Condition::any()
                    .add(service_entry::Column::InternalHealthCheckEnabled.eq(true))
                    .add(service_entry::Column::ExternalHealthCheckEnabled.eq(true)),
            )
            .all(&self.db)
            .await?;

        let probes: Vec<(i32, ProbeTarget, String)> = entries
            .into_iter()
            .flat_map(|entry| {
                let internal = enabled_url(
                    entry.internal_health_check_enabled,
                    entry.internalurl.as_deref(),
                )
                .map(|url| (entry.id, ProbeTarget::Internal, url));
                let external = enabled_url(
                    entry.external_health_check_enabled,
                    entry.externalurl.as_deref(),
                )
                .map(|url| (entry.id, ProbeTarget::External, url));
                internal.into_iter().chain(external)
            })
            .collect();

        let results: Vec<ProbeResult> = stream::iter(probes)
            .map(|(entry_id, target, url)| async move {
                let status = self.probe(&url).await;
                debug!(entry_id, ?target, url = %url, status = %status, "Probe finished.");
                ProbeResult {
                    entry_id,
                    target,
                    status,
                    checked_at: Utc::now(),
                }
            })
            .buffer_unordered(PROBE_CONCURRENCY)
            .collect()
            .await;

        self.commit(&results).await?;
        Ok(results)
    }

    async fn probe(&self, url: &str) -> String {
        match self.client.get(url).send().await {
            Ok(response) => response.status().as_u16().to_string(),
            Err(e) => {
                debug!(url = %url, error = %e, "Probe failed.");
                format!("Error: {}", classify_error(&e))
            }
        }
    }

    /// Writes every result of a pass in one transaction, touching only the
    /// status columns.
    async fn commit(&self, results: &[ProbeResult]) -> Result<(), DbErr> {
        if results.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin().await?;
        for result in results {
            let (status_col, update_col) = match result.target {
                ProbeTarget::Internal => (
                    service_entry::Column::InternalHealthCheckStatus,
                    service_entry::Column::InternalHealthCheckUpdate,
                ),
                ProbeTarget::External => (
                    service_entry::Column::ExternalHealthCheckStatus,
                    service_entry::Column::ExternalHealthCheckUpdate,
                ),
            };
            ServiceEntry::update_many()
                .col_expr(status_col, Expr::value(result.status.clone()))
                .col_expr(update_col, Expr::value(result.checked_at))
                .filter(service_entry::Column::Id.eq(result.entry_id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await
    }

    pub async fn start_periodic(self: Arc<Self>, period: Duration, mut shutdown_rx: watch::Receiver<()>) {
        info!(period_secs = period.as_secs(), "Health check scheduler started.");
        let mut interval = delayed_ticker(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_pass().await {
                        Ok(results) => debug!(probes = results.len(), "Health check pass complete."),
                        Err(e) => error!(error = %e, "Failed to store health check results."),
                    }
                },
                _ = shutdown_rx.changed() => {
                    info!("Health check scheduler shutting down.");
                    break;
                }
            }
        }
    }
}

fn enabled_url(enabled: bool, url: Option<&str>) -> Option<String> {
    if !enabled {
        return None;
    }
    url.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(String::from)
}

/// Maps a request failure onto the error kinds stored in status columns.
pub fn classify_error(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "Timeout"
    } else if err.is_builder() {
        "InvalidURL"
    } else if err.is_connect() {
        "ConnectionError"
    } else {
        "RequestError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;
    use crate::test_util::spawn_test_server;
    use axum::{Router, http::StatusCode, routing::get};
    use sea_orm::{ActiveModelTrait, Set};

    async fn insert_entry(
        db: &DatabaseConnection,
        name: &str,
        internal: Option<&str>,
        external: Option<&str>,
    ) -> service_entry::Model {
        service_entry::ActiveModel {
            host: Set("h1".to_string()),
            container_name: Set(name.to_string()),
            internalurl: Set(internal.map(String::from)),
            externalurl: Set(external.map(String::from)),
            sort_priority: Set(0),
            internal_health_check_enabled: Set(internal.is_some()),
            external_health_check_enabled: Set(external.is_some()),
            is_static: Set(false),
            docker_status: Set(Some("running".to_string())),
            last_updated: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn reload(db: &DatabaseConnection, id: i32) -> service_entry::Model {
        ServiceEntry::find_by_id(id).one(db).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_url_records_error_without_failing_pass() {
        let db = setup_db().await;
        let app = Router::new().route("/", get(|| async { StatusCode::NO_CONTENT }));
        let addr = spawn_test_server(app).await;

        let broken = insert_entry(&db, "broken", Some("http://127.0.0.1:1/"), None).await;
        let healthy = insert_entry(&db, "healthy", None, Some(&format!("http://{addr}/"))).await;

        let service = HealthCheckService::new(db.clone(), Duration::from_secs(5)).unwrap();
        let results = service.run_pass().await.unwrap();
        assert_eq!(results.len(), 2);

        let broken_after = reload(&db, broken.id).await;
        assert_eq!(
            broken_after.internal_health_check_status.as_deref(),
            Some("Error: ConnectionError")
        );
        assert!(broken_after.internal_health_check_update.is_some());
        assert_eq!(broken_after.external_health_check_status, None);

        let healthy_after = reload(&db, healthy.id).await;
        assert_eq!(
            healthy_after.external_health_check_status.as_deref(),
            Some("204")
        );
        assert!(healthy_after.external_health_check_update.is_some());
    }

    #[tokio::test]
    async fn test_pass_only_touches_status_columns() {
        let db = setup_db().await;
        let entry = insert_entry(&db, "app", Some("http://127.0.0.1:1/"), None).await;

        let service = HealthCheckService::new(db.clone(), Duration::from_secs(5)).unwrap();
        service.run_pass().await.unwrap();

        let after = reload(&db, entry.id).await;
        let mut expected = entry.clone();
        expected.internal_health_check_status = after.internal_health_check_status.clone();
        expected.internal_health_check_update = after.internal_health_check_update;
        assert_eq!(after, expected);
    }

    #[tokio::test]
    async fn test_timeout_and_invalid_url_are_classified() {
        let db = setup_db().await;
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let addr = spawn_test_server(app).await;

        let slow = insert_entry(&db, "slow", Some(&format!("http://{addr}/slow")), None).await;
        let invalid = insert_entry(&db, "invalid", Some("not a url"), None).await;

        let service = HealthCheckService::new(db.clone(), Duration::from_millis(300)).unwrap();
        service.run_pass().await.unwrap();

        assert_eq!(
            reload(&db, slow.id).await.internal_health_check_status.as_deref(),
            Some("Error: Timeout")
        );
        assert_eq!(
            reload(&db, invalid.id)
                .await
                .internal_health_check_status
                .as_deref(),
            Some("Error: InvalidURL")
        );
    }

    #[tokio::test]
    async fn test_disabled_probes_are_skipped() {
        let db = setup_db().await;
        let entry = service_entry::ActiveModel {
            host: Set("h1".to_string()),
            container_name: Set("quiet".to_string()),
            internalurl: Set(Some("http://127.0.0.1:1/".to_string())),
            sort_priority: Set(0),
            internal_health_check_enabled: Set(false),
            external_health_check_enabled: Set(false),
            is_static: Set(false),
            last_updated: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let service = HealthCheckService::new(db.clone(), Duration::from_secs(5)).unwrap();
        assert!(service.run_pass().await.unwrap().is_empty());
        assert_eq!(reload(&db, entry.id).await.internal_health_check_status, None);
    }

    #[tokio::test]
    async fn test_periodic_loop_waits_a_full_period_before_first_pass() {
        let db = setup_db().await;
        let entry = insert_entry(&db, "app", Some("http://127.0.0.1:1/"), None).await;
        let service = Arc::new(HealthCheckService::new(db.clone(), Duration::from_secs(5)).unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(service.start_periodic(Duration::from_secs(3600), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(reload(&db, entry.id).await.internal_health_check_status, None);
    }

    #[tokio::test]
    async fn test_periodic_loop_stops_on_shutdown() {
        let db = setup_db().await;
        let service = Arc::new(HealthCheckService::new(db, Duration::from_secs(5)).unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(service.start_periodic(Duration::from_secs(60), shutdown_rx));

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
