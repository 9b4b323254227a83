pub mod backup_service;
pub mod field_aliases;
pub mod health_check_service;
pub mod icon_resolver;
pub mod image_metadata;
pub mod widget_refresh_service;

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Ticker for the background workers. The first tick fires one `period`
/// after start, and a slow cycle pushes the next tick back instead of
/// firing the missed ones in a burst.
pub(crate) fn delayed_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
