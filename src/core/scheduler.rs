//! Refresh Scheduler
//!
//! Every interval, takes the least recently updated slice of the registry and
//! either evicts (too old, or valuation under the floor) or re-enriches each
//! token. Network calls run with no registry lock held; only the final
//! mutation touches the map. Cadence, batch size and retention are read from
//! the shared refresh settings, so a change takes effect on the next cycle.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::enricher::MetricsEnricher;
use crate::core::listener::Shutdown;
use crate::core::registry::TokenRegistry;
use crate::models::config::{MonitorConfig, RefreshSettings, SharedRefresh, SharedThresholds};
use crate::telemetry::PipelineStats;
use crate::utils::constants::short;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Pause between per-token enrichment calls
    pub pacing: Duration,
    /// Interval, batch size and retention, re-read every cycle
    pub refresh: SharedRefresh,
}

impl SchedulerSettings {
    pub fn new(pacing: Duration, refresh: SharedRefresh) -> Self {
        Self { pacing, refresh }
    }

    pub fn from_config(config: &MonitorConfig, refresh: SharedRefresh) -> Self {
        Self::new(config.refresh_pacing, refresh)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let config = MonitorConfig::default();
        Self::from_config(&config, SharedRefresh::new(RefreshSettings::from_config(&config)))
    }
}

/// Ticks every `period`, first tick one period from now
fn refresh_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub selected: usize,
    pub refreshed: usize,
    /// No valuation source answered; valuation kept, holders refreshed
    pub failed: usize,
    pub evicted_aged: usize,
    pub evicted_floor: usize,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.selected == 0
    }
}

pub struct RefreshScheduler {
    registry: TokenRegistry,
    enricher: MetricsEnricher,
    thresholds: SharedThresholds,
    settings: SchedulerSettings,
    stats: Arc<PipelineStats>,
    shutdown: Shutdown,
}

impl RefreshScheduler {
    pub fn new(
        registry: TokenRegistry,
        enricher: MetricsEnricher,
        thresholds: SharedThresholds,
        settings: SchedulerSettings,
        stats: Arc<PipelineStats>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            registry,
            enricher,
            thresholds,
            settings,
            stats,
            shutdown,
        }
    }

    /// Run cycles until shutdown
    pub async fn run(self) {
        let initial = self.settings.refresh.load();
        info!(
            "🔁 Refresh scheduler started (every {}s, batch {})",
            initial.interval.as_secs(),
            initial.batch_size
        );

        let mut period = initial.interval.max(Duration::from_millis(1));
        let mut interval = refresh_interval(period);

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                _ = interval.tick() => {}
            }
            self.run_cycle(Utc::now()).await;

            let next = self.settings.refresh.load().interval;
            if next != period && !next.is_zero() {
                info!("🔁 Refresh interval changed to {}ms", next.as_millis());
                period = next;
                interval = refresh_interval(period);
            }
        }

        info!("🔁 Refresh scheduler stopped");
    }

    /// One sweep over the stalest batch, with `now` as the age reference
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        if self.registry.is_empty() {
            return report;
        }

        let refresh = self.settings.refresh.load();
        let batch = self.registry.stalest(refresh.batch_size);
        report.selected = batch.len();
        let mut enriched_any = false;

        for token in batch {
            if self.shutdown.is_triggered() {
                break;
            }

            if token.age(now) > refresh.retention {
                if self.registry.evict(&token.address).is_some() {
                    debug!(
                        "⌛ {} evicted after {:.0} min",
                        short(&token.address),
                        token.age_minutes(now)
                    );
                    report.evicted_aged += 1;
                }
                continue;
            }

            if enriched_any && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }
            enriched_any = true;

            let (metrics, enumerated) = tokio::join!(
                self.enricher.try_enrich(&token.address),
                self.enricher.fetch_holder_count(&token.address)
            );

            let Some(metrics) = metrics else {
                // keep the last known valuation, publish the holder refresh
                self.registry.refresh_holders(&token.address, enumerated, Utc::now());
                debug!("📭 No source answered for {}", short(&token.address));
                report.failed += 1;
                continue;
            };

            if self.thresholds.load().below_floor(metrics.market_cap) {
                if self.registry.evict(&token.address).is_some() {
                    debug!(
                        "📉 {} evicted at mcap ${:.0}",
                        short(&token.address),
                        metrics.market_cap
                    );
                    report.evicted_floor += 1;
                }
                continue;
            }

            let holders = enumerated.max(metrics.holder_count).max(1);
            if self
                .registry
                .refresh_metrics(&token.address, &metrics, holders, Utc::now())
                .is_some()
            {
                report.refreshed += 1;
            }
        }

        self.stats.record_cycle(
            report.refreshed as u64,
            report.failed as u64,
            report.evicted_aged as u64,
            report.evicted_floor as u64,
        );

        if report.failed > 0 && report.failed == report.selected {
            warn!("⚠️ Refresh cycle: no source answered for any of {} tokens", report.selected);
        } else {
            debug!(
                "🔁 Cycle: {} selected, {} refreshed, {} failed, {} aged out, {} under floor",
                report.selected,
                report.refreshed,
                report.failed,
                report.evicted_aged,
                report.evicted_floor
            );
        }
        report
    }
}
