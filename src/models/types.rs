//! Type definitions for the launch monitor
//! Tracked tokens, enrichment metrics and the change events published to consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::config::Thresholds;
use crate::utils::constants::GRADUATION_MARKET_CAP_USD;

/// Side of a bonding-curve trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

/// Display metadata for a mint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            symbol: "???".to_string(),
        }
    }
}

/// Valuation, volume and holder numbers from one enrichment pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub market_cap: f64,
    pub volume_5m: f64,
    pub volume_1h: f64,
    /// 0-100, derived from `market_cap`
    pub bonding_progress: f64,
    pub holder_count: u64,
    /// Trailing 5 minute buy/sell transaction counts, when the source reports them
    pub buys_5m: Option<u64>,
    pub sells_5m: Option<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            market_cap: 0.0,
            volume_5m: 0.0,
            volume_1h: 0.0,
            bonding_progress: 0.0,
            holder_count: 1,
            buys_5m: None,
            sells_5m: None,
        }
    }
}

impl Metrics {
    /// Metrics carrying only a valuation
    pub fn with_market_cap(market_cap: f64) -> Self {
        Self {
            market_cap,
            ..Self::default()
        }
    }

    /// A source result is usable only with a strictly positive valuation
    pub fn is_usable(&self) -> bool {
        self.market_cap.is_finite() && self.market_cap > 0.0
    }
}

/// Percentage of the way to graduation, always within [0, 100]
pub fn bonding_progress(market_cap: f64) -> f64 {
    if market_cap.is_nan() || market_cap <= 0.0 {
        return 0.0;
    }
    (market_cap / GRADUATION_MARKET_CAP_USD * 100.0).min(100.0)
}

/// A tracked pump.fun token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Mint address. Opaque key, never parsed.
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub market_cap: f64,
    pub volume_5m: f64,
    pub volume_1h: f64,
    pub holders: u64,
    pub buys: u64,
    pub sells: u64,
    pub bonding_progress: f64,
    /// Trailing 5 minute buy/sell transaction counts from the last source
    /// that reported them
    pub buys_5m: Option<u64>,
    pub sells_5m: Option<u64>,
    pub dev_sold: bool,
}

impl Token {
    /// New token with default metadata and no activity
    pub fn new(address: impl Into<String>, now: DateTime<Utc>) -> Self {
        let metadata = TokenMetadata::default();
        Self {
            address: address.into(),
            name: metadata.name,
            symbol: metadata.symbol,
            created_at: now,
            last_update: now,
            market_cap: 0.0,
            volume_5m: 0.0,
            volume_1h: 0.0,
            holders: 1,
            buys: 0,
            sells: 0,
            bonding_progress: 0.0,
            buys_5m: None,
            sells_5m: None,
            dev_sold: false,
        }
    }

    /// Token first seen at `now`, already enriched
    pub fn discovered(
        address: impl Into<String>,
        metadata: TokenMetadata,
        metrics: &Metrics,
        now: DateTime<Utc>,
    ) -> Self {
        let mut token = Self::new(address, now);
        token.name = metadata.name;
        token.symbol = metadata.symbol;
        token.apply_metrics(metrics, metrics.holder_count, now);
        token
    }

    /// Overwrite valuation fields from a refresh
    pub fn apply_metrics(&mut self, metrics: &Metrics, holders: u64, now: DateTime<Utc>) {
        self.market_cap = metrics.market_cap.max(0.0);
        self.volume_5m = metrics.volume_5m.max(0.0);
        self.volume_1h = metrics.volume_1h.max(0.0);
        self.bonding_progress = bonding_progress(self.market_cap);
        self.buys_5m = metrics.buys_5m;
        self.sells_5m = metrics.sells_5m;
        self.set_holders(holders, now);
    }

    /// Replace the holder count, at least 1
    pub fn set_holders(&mut self, holders: u64, now: DateTime<Utc>) {
        self.holders = holders.max(1);
        self.touch(now);
    }

    pub fn record_trade(&mut self, side: TradeSide, now: DateTime<Utc>) {
        match side {
            TradeSide::Buy => self.buys += 1,
            TradeSide::Sell => self.sells += 1,
        }
        self.touch(now);
    }

    /// Bump last-update, never moving it backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_update {
            self.last_update = now;
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        self.age(now).num_milliseconds() as f64 / 60_000.0
    }

    /// Buys per sell, with sells floored at 1
    pub fn buy_sell_ratio(&self) -> f64 {
        self.buys as f64 / self.sells.max(1) as f64
    }

    pub fn meets_alert_criteria(&self, thresholds: &Thresholds) -> bool {
        self.market_cap >= thresholds.min_market_cap
            && self.market_cap <= thresholds.max_market_cap
            && self.holders >= thresholds.min_holders
            && self.volume_5m >= thresholds.min_volume_5m
            && self.buy_sell_ratio() >= thresholds.min_buy_sell_ratio
    }
}

/// What happened to a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Created,
    Updated,
    Evicted,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Created => "created",
            ChangeAction::Updated => "updated",
            ChangeAction::Evicted => "evicted",
        }
    }
}

/// Snapshot of a token at the moment it changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    pub token: Token,
}

impl ChangeEvent {
    pub fn new(action: ChangeAction, token: Token) -> Self {
        Self { action, token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_buy_sell_ratio_floors_sells() {
        let mut token = Token::new("mint", Utc::now());
        assert_eq!(token.buy_sell_ratio(), 0.0);

        token.buys = 7;
        assert_eq!(token.buy_sell_ratio(), 7.0);

        token.sells = 2;
        assert_eq!(token.buy_sell_ratio(), 3.5);
        assert!(token.buy_sell_ratio().is_finite());
    }

    #[test]
    fn test_bonding_progress_bounds() {
        assert_eq!(bonding_progress(-5_000.0), 0.0);
        assert_eq!(bonding_progress(0.0), 0.0);
        assert_eq!(bonding_progress(f64::NAN), 0.0);
        assert_eq!(bonding_progress(34_500.0), 50.0);
        assert_eq!(bonding_progress(69_000.0), 100.0);
        assert_eq!(bonding_progress(1e12), 100.0);
        assert_eq!(bonding_progress(f64::INFINITY), 100.0);
    }

    #[test]
    fn test_last_update_is_monotonic() {
        let t0 = Utc::now();
        let mut token = Token::new("mint", t0);

        token.record_trade(TradeSide::Buy, t0 + Duration::seconds(10));
        assert_eq!(token.last_update, t0 + Duration::seconds(10));

        token.record_trade(TradeSide::Sell, t0 + Duration::seconds(5));
        assert_eq!(token.last_update, t0 + Duration::seconds(10));
        assert_eq!((token.buys, token.sells), (1, 1));
    }

    #[test]
    fn test_apply_metrics_clamps() {
        let now = Utc::now();
        let mut token = Token::new("mint", now);
        let metrics = Metrics {
            market_cap: 500_000.0,
            ..Metrics::default()
        };

        token.apply_metrics(&metrics, 0, now);
        assert_eq!(token.bonding_progress, 100.0);
        assert_eq!(token.holders, 1);
        assert_eq!(token.buys_5m, None);

        let metrics = Metrics {
            market_cap: 20_000.0,
            buys_5m: Some(42),
            sells_5m: Some(17),
            ..Metrics::default()
        };
        token.apply_metrics(&metrics, 30, now);
        assert_eq!((token.buys_5m, token.sells_5m), (Some(42), Some(17)));
        assert_eq!(token.holders, 30);
    }

    #[test]
    fn test_alert_criteria() {
        let thresholds = Thresholds::default();
        let mut token = Token::new("mint", Utc::now());
        token.market_cap = 20_000.0;
        token.volume_5m = 2_500.0;
        token.holders = 40;
        token.buys = 30;
        token.sells = 10;
        assert!(token.meets_alert_criteria(&thresholds));

        token.market_cap = 80_000.0;
        assert!(!token.meets_alert_criteria(&thresholds));

        token.market_cap = 20_000.0;
        token.sells = 25;
        assert!(!token.meets_alert_criteria(&thresholds));
    }

    #[test]
    fn test_age() {
        let t0 = Utc::now();
        let token = Token::new("mint", t0);
        assert_eq!(token.age_minutes(t0 + Duration::minutes(31)), 31.0);
    }
}
