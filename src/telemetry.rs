//! Pipeline telemetry
//!
//! Lock-free counters shared by the listener, the scheduler and the bridge,
//! plus a serializable snapshot and a periodic stats line.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::core::classifier::EventKind;

/// Counters for one process lifetime
#[derive(Debug)]
pub struct PipelineStats {
    notifications: AtomicU64,
    duplicates: AtomicU64,
    ignored: AtomicU64,
    creations: AtomicU64,
    trades: AtomicU64,
    dropped: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    refresh_cycles: AtomicU64,
    refreshed: AtomicU64,
    refresh_failures: AtomicU64,
    evicted_aged: AtomicU64,
    evicted_floor: AtomicU64,
    alerts: AtomicU64,
    sessions: AtomicU64,
    started_at: u64,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self {
            notifications: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            creations: AtomicU64::new(0),
            trades: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            created: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            refresh_cycles: AtomicU64::new(0),
            refreshed: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
            evicted_aged: AtomicU64::new(0),
            evicted_floor: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
            sessions: AtomicU64::new(0),
            started_at: current_timestamp(),
        }
    }
}

impl PipelineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classified(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::Creation => &self.creations,
            EventKind::Buy | EventKind::Sell => &self.trades,
            EventKind::Ignore => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle(&self, refreshed: u64, failed: u64, evicted_aged: u64, evicted_floor: u64) {
        self.refresh_cycles.fetch_add(1, Ordering::Relaxed);
        self.refreshed.fetch_add(refreshed, Ordering::Relaxed);
        self.refresh_failures.fetch_add(failed, Ordering::Relaxed);
        self.evicted_aged.fetch_add(evicted_aged, Ordering::Relaxed);
        self.evicted_floor.fetch_add(evicted_floor, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            notifications: self.notifications.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            creations: self.creations.load(Ordering::Relaxed),
            trades: self.trades.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            refresh_cycles: self.refresh_cycles.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            evicted_aged: self.evicted_aged.load(Ordering::Relaxed),
            evicted_floor: self.evicted_floor.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
            uptime_secs: current_timestamp().saturating_sub(self.started_at),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub notifications: u64,
    pub duplicates: u64,
    pub ignored: u64,
    pub creations: u64,
    pub trades: u64,
    pub dropped: u64,
    pub created: u64,
    pub updated: u64,
    pub refresh_cycles: u64,
    pub refreshed: u64,
    pub refresh_failures: u64,
    pub evicted_aged: u64,
    pub evicted_floor: u64,
    pub alerts: u64,
    pub sessions: u64,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    pub fn evicted(&self) -> u64 {
        self.evicted_aged + self.evicted_floor
    }

    /// One-line summary for the periodic log
    pub fn summary(&self, tracked: usize) -> String {
        format!(
            "📊 Stats | Tracked: {} | Notifications: {} | Creations: {} | Trades: {} | New: {} | Dropped: {} | Refreshed: {} | Evicted: {} | Alerts: {}",
            tracked,
            self.notifications,
            self.creations,
            self.trades,
            self.created,
            self.dropped,
            self.refreshed,
            self.evicted(),
            self.alerts,
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Log a stats line every `every` until the task is aborted
pub fn spawn_stats_printer<F>(
    stats: Arc<PipelineStats>,
    every: Duration,
    tracked: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            info!("{}", stats.snapshot().summary(tracked()));
        }
    })
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
