//! Configuration module for the launch monitor
//!
//! Two layers:
//! - [`MonitorConfig`]: endpoints, credentials and timings, fixed for the life
//!   of the process and loaded from the environment.
//! - [`Thresholds`] and [`RefreshSettings`]: alert/removal numbers and the
//!   refresh cadence/retention, each held behind a [`Shared`] handle so they
//!   can be swapped at runtime without restarting the pipeline.
//!
//! Defaults come from `utils/constants.rs`.

use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::{
    helius_rpc_url, helius_wss_url, mask_url, DEFAULT_ACK_TIMEOUT_SECS,
    DEFAULT_HOLDER_PAGE_LIMIT, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_EVENTS, DEFAULT_PING_TIMEOUT_SECS, DEFAULT_REFRESH_BATCH_SIZE,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REFRESH_PACING_MS, DEFAULT_RESOLVE_ATTEMPTS,
    DEFAULT_RESOLVE_RETRY_MS, DEFAULT_RETENTION_SECS, DEFAULT_SETTLE_DELAY_MS,
    PUMP_FUN_PROGRAM_ID,
};

/// Read `key` from the environment, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("⚠️ Ignoring unparsable {}={:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Non-empty, non-placeholder secret from the environment
fn env_secret(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != "YOUR_API_KEY")
}

/// Process-wide settings for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Log subscription endpoint
    pub wss_url: String,
    /// JSON-RPC endpoint for getTransaction / DAS calls
    pub rpc_url: String,
    /// Secondary analytics provider key. `None` disables that source.
    pub birdeye_api_key: Option<String>,
    /// Program whose logs are subscribed to
    pub program_id: String,

    /// Wait before resolving a creation transaction
    pub settle_delay: Duration,
    pub resolve_attempts: u32,
    pub resolve_retry_delay: Duration,

    /// Socket silence before a liveness probe
    pub idle_timeout: Duration,
    pub ping_timeout: Duration,
    pub ack_timeout: Duration,

    /// Timeout for every enrichment/RPC HTTP call
    pub http_timeout: Duration,
    pub holder_page_limit: u32,

    pub refresh_interval: Duration,
    pub refresh_batch_size: usize,
    /// Pause between per-token enrichment calls inside one refresh cycle
    pub refresh_pacing: Duration,

    /// Maximum age before a token is evicted
    pub retention: Duration,

    /// Upper bound on notifications processed concurrently
    pub max_concurrent_events: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            wss_url: String::new(),
            rpc_url: String::new(),
            birdeye_api_key: None,
            program_id: PUMP_FUN_PROGRAM_ID.to_string(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            resolve_attempts: DEFAULT_RESOLVE_ATTEMPTS,
            resolve_retry_delay: Duration::from_millis(DEFAULT_RESOLVE_RETRY_MS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            ping_timeout: Duration::from_secs(DEFAULT_PING_TIMEOUT_SECS),
            ack_timeout: Duration::from_secs(DEFAULT_ACK_TIMEOUT_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            holder_page_limit: DEFAULT_HOLDER_PAGE_LIMIT,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            refresh_batch_size: DEFAULT_REFRESH_BATCH_SIZE,
            refresh_pacing: Duration::from_millis(DEFAULT_REFRESH_PACING_MS),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            max_concurrent_events: DEFAULT_MAX_CONCURRENT_EVENTS,
        }
    }
}

impl MonitorConfig {
    /// Load settings from the environment
    ///
    /// Endpoints come from `PUMPSCOPE_WSS_URL` / `PUMPSCOPE_RPC_URL` when set,
    /// otherwise they are built from `HELIUS_API_KEY`.
    pub fn from_env() -> AppResult<Self> {
        let helius_key = env_secret("HELIUS_API_KEY");
        if helius_key.is_some() {
            info!("🔑 HELIUS_API_KEY configured (key hidden)");
        }

        let wss_url = std::env::var("PUMPSCOPE_WSS_URL")
            .ok()
            .or_else(|| helius_key.as_deref().map(helius_wss_url))
            .ok_or_else(|| AppError::missing_api_key("HELIUS_API_KEY"))?;
        let rpc_url = std::env::var("PUMPSCOPE_RPC_URL")
            .ok()
            .or_else(|| helius_key.as_deref().map(helius_rpc_url))
            .ok_or_else(|| AppError::missing_api_key("HELIUS_API_KEY"))?;

        let birdeye_api_key = env_secret("BIRDEYE_API_KEY");
        if birdeye_api_key.is_none() {
            info!("ℹ️ BIRDEYE_API_KEY not set, secondary analytics source disabled");
        }

        let defaults = Self::default();
        let config = Self {
            wss_url,
            rpc_url,
            birdeye_api_key,
            program_id: env_or("PUMPSCOPE_PROGRAM_ID", defaults.program_id),
            retention: Duration::from_secs(env_or(
                "PUMPSCOPE_RETENTION_SECS",
                defaults.retention.as_secs(),
            )),
            refresh_interval: Duration::from_secs(env_or(
                "PUMPSCOPE_REFRESH_SECS",
                defaults.refresh_interval.as_secs(),
            )),
            refresh_batch_size: env_or("PUMPSCOPE_REFRESH_BATCH", defaults.refresh_batch_size),
            ..defaults
        };

        config.validate()?;
        info!(
            "⚙️ Endpoints: ws={} rpc={}",
            mask_url(&config.wss_url),
            mask_url(&config.rpc_url)
        );
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.wss_url.is_empty() || self.rpc_url.is_empty() {
            return Err(AppError::invalid_config("subscription and RPC endpoints are required"));
        }
        if !self.wss_url.starts_with("ws://") && !self.wss_url.starts_with("wss://") {
            return Err(AppError::invalid_config(format!(
                "subscription endpoint must be ws:// or wss://, got {}",
                mask_url(&self.wss_url)
            )));
        }
        if self.resolve_attempts == 0 {
            return Err(AppError::invalid_config("resolve_attempts must be at least 1"));
        }
        if self.refresh_interval.is_zero() {
            return Err(AppError::invalid_config("refresh interval must be positive"));
        }
        if self.refresh_batch_size == 0 {
            return Err(AppError::invalid_config("refresh batch size must be positive"));
        }
        if self.retention.is_zero() {
            return Err(AppError::invalid_config("retention window must be positive"));
        }
        if self.max_concurrent_events == 0 {
            return Err(AppError::invalid_config("max_concurrent_events must be positive"));
        }
        Ok(())
    }

    pub fn retention_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX)
    }
}

/// Alert and removal thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Minimum market cap in USD
    pub min_market_cap: f64,
    /// Maximum market cap (catch early)
    pub max_market_cap: f64,
    pub min_holders: u64,
    pub min_volume_5m: f64,
    pub min_buy_sell_ratio: f64,
    /// Refreshed market cap below this (and above zero) evicts the token
    pub remove_below_market_cap: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_market_cap: 5_000.0,
            max_market_cap: 50_000.0,
            min_holders: 10,
            min_volume_5m: 1_000.0,
            min_buy_sell_ratio: 1.5,
            remove_below_market_cap: 1_000.0,
        }
    }
}

impl Thresholds {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_market_cap: env_or("PUMPSCOPE_MIN_MCAP", d.min_market_cap),
            max_market_cap: env_or("PUMPSCOPE_MAX_MCAP", d.max_market_cap),
            min_holders: env_or("PUMPSCOPE_MIN_HOLDERS", d.min_holders),
            min_volume_5m: env_or("PUMPSCOPE_MIN_VOLUME_5M", d.min_volume_5m),
            min_buy_sell_ratio: env_or("PUMPSCOPE_MIN_BUY_SELL_RATIO", d.min_buy_sell_ratio),
            remove_below_market_cap: env_or(
                "PUMPSCOPE_REMOVE_BELOW_MCAP",
                d.remove_below_market_cap,
            ),
        }
    }

    /// Whether a refreshed valuation falls under the removal floor
    pub fn below_floor(&self, market_cap: f64) -> bool {
        market_cap > 0.0 && market_cap < self.remove_below_market_cap
    }
}

/// Refresh cadence and retention, adjustable while the pipeline runs
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub batch_size: usize,
    /// Maximum age before a token is evicted
    pub retention: chrono::Duration,
}

impl RefreshSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            interval: config.refresh_interval,
            batch_size: config.refresh_batch_size,
            retention: config.retention_chrono(),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// Runtime-swappable settings
///
/// Readers take an `Arc` snapshot and never hold the lock while using it;
/// `store` replaces the whole struct in one step.
#[derive(Debug, Default)]
pub struct Shared<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(value))),
        }
    }

    pub fn load(&self) -> Arc<T> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn store(&self, value: T) {
        let next = Arc::new(value);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!("🎚️ Runtime settings reloaded");
    }
}

pub type SharedThresholds = Shared<Thresholds>;
pub type SharedRefresh = Shared<RefreshSettings>;
