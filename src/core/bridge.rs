//! Change Bridge
//!
//! Periodically drains the change feed, mirrors each event into the
//! consumer-side [`TokenCache`] and forwards it to the registered consumers in
//! FIFO order. Applies the retention window again on its own side so the
//! consumer never shows a token the registry would already have aged out.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::listener::Shutdown;
use crate::core::publisher::ChangeFeed;
use crate::models::config::SharedThresholds;
use crate::models::types::{ChangeAction, ChangeEvent, Token};
use crate::telemetry::PipelineStats;
use crate::utils::cache::TokenCache;

/// Bridge drain period
pub const BRIDGE_TICK: Duration = Duration::from_secs(1);

/// Alerts kept for display
const RECENT_ALERTS_CAP: usize = 50;

/// Receiver of forwarded change events
pub trait ChangeConsumer: Send {
    fn on_change(&mut self, action: ChangeAction, token: &Token);
}

impl<F> ChangeConsumer for F
where
    F: FnMut(ChangeAction, &Token) + Send,
{
    fn on_change(&mut self, action: ChangeAction, token: &Token) {
        self(action, token)
    }
}

pub struct ChangeBridge {
    feed: ChangeFeed,
    cache: TokenCache,
    consumers: Vec<Box<dyn ChangeConsumer>>,
    tick: Duration,
}

impl ChangeBridge {
    pub fn new(feed: ChangeFeed, cache: TokenCache) -> Self {
        Self {
            feed,
            cache,
            consumers: Vec::new(),
            tick: BRIDGE_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn add_consumer(&mut self, consumer: impl ChangeConsumer + 'static) {
        self.consumers.push(Box::new(consumer));
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    fn forward(&mut self, action: ChangeAction, token: &Token) {
        for consumer in self.consumers.iter_mut() {
            consumer.on_change(action, token);
        }
    }

    /// Apply one event to the cache; returns true if it was forwarded
    pub fn apply(&mut self, event: ChangeEvent, now: DateTime<Utc>) -> bool {
        let ChangeEvent { action, token } = event;
        match action {
            ChangeAction::Created | ChangeAction::Updated => {
                if self.cache.is_expired(&token, now) {
                    // registry has not caught up yet; drop it here instead
                    if let Some(evicted) = self.cache.remove(&token.address) {
                        self.forward(ChangeAction::Evicted, &evicted);
                    }
                    return false;
                }
                self.cache.upsert(token.clone());
                self.forward(action, &token);
                true
            }
            ChangeAction::Evicted => match self.cache.remove(&token.address) {
                Some(_) => {
                    self.forward(ChangeAction::Evicted, &token);
                    true
                }
                None => false,
            },
        }
    }

    /// Drain the feed, then age out cached entries. Returns events forwarded.
    pub fn pump(&mut self, now: DateTime<Utc>) -> usize {
        let mut forwarded = 0;
        for event in self.feed.drain() {
            if self.apply(event, now) {
                forwarded += 1;
            }
        }

        for token in self.cache.drain_expired(now) {
            debug!("⌛ Bridge aged out {}", token.address);
            self.forward(ChangeAction::Evicted, &token);
            forwarded += 1;
        }
        forwarded
    }

    /// Pump every tick until shutdown, then once more
    pub async fn run(mut self, shutdown: Shutdown) {
        let mut interval = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = interval.tick() => {}
            }
            self.pump(Utc::now());
        }
        self.pump(Utc::now());
        info!("🌉 Change bridge stopped ({} tokens cached)", self.cache.len());
    }
}

// ============================================
// ALERT CONSUMER
// ============================================

/// Shared list of the most recent alert lines, newest last
#[derive(Clone, Default)]
pub struct AlertLog {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl AlertLog {
    fn push(&self, line: String) {
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() >= RECENT_ALERTS_CAP {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn recent(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

/// Logs new tokens and raises an alert when an update meets the thresholds
pub struct AlertConsumer {
    thresholds: SharedThresholds,
    stats: Option<Arc<PipelineStats>>,
    log: AlertLog,
}

impl AlertConsumer {
    pub fn new(thresholds: SharedThresholds) -> Self {
        Self {
            thresholds,
            stats: None,
            log: AlertLog::default(),
        }
    }

    pub fn with_stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn log(&self) -> AlertLog {
        self.log.clone()
    }
}

impl ChangeConsumer for AlertConsumer {
    fn on_change(&mut self, action: ChangeAction, token: &Token) {
        match action {
            ChangeAction::Created => {
                let line = format!(
                    "🆕 New token: {} ({}) - MCap: ${:.0}",
                    token.symbol, token.name, token.market_cap
                );
                info!("{}", line);
                self.log.push(line);
            }
            ChangeAction::Updated => {
                if token.meets_alert_criteria(&self.thresholds.load()) {
                    let recent = match (token.buys_5m, token.sells_5m) {
                        (Some(buys), Some(sells)) => format!(", 5m txns: {}/{}", buys, sells),
                        _ => String::new(),
                    };
                    let line = format!(
                        "🔥 ALERT: {} - MCap: ${:.0}, Vol: ${:.0}, Holders: {}, B/S: {:.2}{}",
                        token.symbol,
                        token.market_cap,
                        token.volume_5m,
                        token.holders,
                        token.buy_sell_ratio(),
                        recent
                    );
                    info!("{}", line);
                    self.log.push(line);
                    if let Some(stats) = &self.stats {
                        stats.record_alert();
                    }
                }
            }
            ChangeAction::Evicted => {
                debug!("🗑️ {} left the tracked set", token.symbol);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::publisher::change_channel;
    use crate::models::config::Thresholds;
    use chrono::Duration as ChronoDuration;

    fn recording_bridge() -> (
        crate::core::publisher::ChangePublisher,
        ChangeBridge,
        Arc<Mutex<Vec<(ChangeAction, String)>>>,
    ) {
        let (publisher, feed) = change_channel();
        let mut bridge = ChangeBridge::new(feed, TokenCache::new(ChronoDuration::minutes(30)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bridge.add_consumer(move |action: ChangeAction, token: &Token| {
            sink.lock().unwrap().push((action, token.address.clone()));
        });
        (publisher, bridge, seen)
    }

    #[test]
    fn test_forwards_in_fifo_order() {
        let (publisher, mut bridge, seen) = recording_bridge();
        let now = Utc::now();

        publisher.publish(ChangeAction::Created, Token::new("a", now));
        publisher.publish(ChangeAction::Created, Token::new("b", now));
        publisher.publish(ChangeAction::Updated, Token::new("a", now));
        publisher.publish(ChangeAction::Evicted, Token::new("b", now));

        assert_eq!(bridge.pump(now), 4);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (ChangeAction::Created, "a".to_string()),
                (ChangeAction::Created, "b".to_string()),
                (ChangeAction::Updated, "a".to_string()),
                (ChangeAction::Evicted, "b".to_string()),
            ]
        );
        assert!(bridge.cache().contains("a"));
        assert!(!bridge.cache().contains("b"));
    }

    #[test]
    fn test_defensive_retention() {
        let (publisher, mut bridge, seen) = recording_bridge();
        let t0 = Utc::now();

        publisher.publish(ChangeAction::Created, Token::new("a", t0));
        bridge.pump(t0);

        // 31 minutes later the registry has not evicted yet, the bridge does
        let later = t0 + ChronoDuration::minutes(31);
        publisher.publish(ChangeAction::Updated, Token::new("a", t0));
        bridge.pump(later);

        // the registry's own eviction arrives afterwards and is swallowed
        publisher.publish(ChangeAction::Evicted, Token::new("a", t0));
        bridge.pump(later);

        let actions: Vec<ChangeAction> = seen.lock().unwrap().iter().map(|(a, _)| *a).collect();
        assert_eq!(actions, vec![ChangeAction::Created, ChangeAction::Evicted]);
        assert!(bridge.cache().is_empty());
    }

    #[test]
    fn test_alert_consumer() {
        let thresholds = SharedThresholds::new(Thresholds::default());
        let stats = PipelineStats::new();
        let mut consumer = AlertConsumer::new(thresholds).with_stats(stats.clone());
        let log = consumer.log();

        let mut token = Token::new("mint", Utc::now());
        token.symbol = "PEPE".to_string();
        consumer.on_change(ChangeAction::Updated, &token);
        assert!(log.recent().is_empty());

        token.market_cap = 20_000.0;
        token.volume_5m = 2_000.0;
        token.holders = 25;
        token.buys = 10;
        token.sells = 2;
        consumer.on_change(ChangeAction::Updated, &token);

        token.buys_5m = Some(12);
        token.sells_5m = Some(3);
        consumer.on_change(ChangeAction::Updated, &token);

        let recent = log.recent();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].contains("ALERT: PEPE"));
        assert!(!recent[0].contains("5m txns"));
        assert!(recent[1].ends_with("5m txns: 12/3"));
        assert_eq!(stats.snapshot().alerts, 2);
    }
}
