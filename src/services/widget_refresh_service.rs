//! Periodically refreshes stored widget values from their upstream APIs.

use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::db::entities::widget;
use crate::db::services::widget_service::{list_widgets, upsert_widget_values};
use crate::services::delayed_ticker;
use crate::widgets::WidgetRegistry;
use crate::widgets::fetchers::FetchError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

pub struct WidgetRefreshService {
    db: DatabaseConnection,
    registry: Arc<WidgetRegistry>,
}

impl WidgetRefreshService {
    pub fn new(db: DatabaseConnection, registry: Arc<WidgetRegistry>) -> Self {
        Self { db, registry }
    }

    /// Refreshes every widget once. A failing widget is logged and skipped;
    /// only listing the widgets can fail the cycle.
    pub async fn run_cycle(&self) -> Result<RefreshSummary, DbErr> {
        let widgets = list_widgets(&self.db).await?;
        let mut summary = RefreshSummary::default();

        for widget in widgets {
            if self.refresh_widget(&widget).await {
                summary.refreshed += 1;
            } else {
                summary.failed += 1;
            }
        }
        Ok(summary)
    }

    async fn refresh_widget(&self, widget: &widget::Model) -> bool {
        let Some(registered) = self.registry.get(&widget.widget_type) else {
            warn!(widget = %widget.widget_name, widget_type = %widget.widget_type, "No fetcher registered for widget type.");
            return false;
        };

        let requested = widget.requested_fields();
        let values = match registered
            .fetcher
            .fetch(
                &widget.widget_url,
                widget.widget_api_key.as_deref(),
                &requested,
                &registered.fields,
            )
            .await
            .and_then(reject_reported_error)
        {
            Ok(values) => values,
            Err(e) => {
                warn!(widget = %widget.widget_name, error = %e, "Widget fetch failed.");
                return false;
            }
        };

        match self.store(widget.id, &values).await {
            Ok(()) => {
                debug!(widget = %widget.widget_name, values = values.len(), "Widget refreshed.");
                true
            }
            Err(e) => {
                error!(widget = %widget.widget_name, error = %e, "Failed to store widget values.");
                false
            }
        }
    }

    async fn store(&self, widget_id: i32, values: &HashMap<String, String>) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;
        upsert_widget_values(&txn, widget_id, values, Utc::now()).await?;
        txn.commit().await
    }

    pub async fn start_periodic(self: Arc<Self>, period: Duration, mut shutdown_rx: watch::Receiver<()>) {
        info!(period_secs = period.as_secs(), "Widget refresh scheduler started.");
        let mut interval = delayed_ticker(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle().await {
                        Ok(summary) => debug!(refreshed = summary.refreshed, failed = summary.failed, "Widget refresh cycle complete."),
                        Err(e) => error!(error = %e, "Failed to load widgets for refresh."),
                    }
                },
                _ = shutdown_rx.changed() => {
                    info!("Widget refresh scheduler shutting down.");
                    break;
                }
            }
        }
    }
}

/// A fetcher may report an upstream failure as an `error` value instead of
/// an `Err`.
fn reject_reported_error(
    mut values: HashMap<String, String>,
) -> Result<HashMap<String, String>, FetchError> {
    match values.remove("error") {
        Some(message) => Err(FetchError::Reported(message)),
        None => Ok(values),
    }
}
