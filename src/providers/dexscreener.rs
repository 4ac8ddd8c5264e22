//! DexScreener API Client - primary valuation source
//!
//! ✅ USED FOR:
//! - Market cap (fdv, falling back to marketCap)
//! - 5m / 1h volume, with 1h / 12 when the 5m bucket is empty
//! - Trailing 5m buy/sell transaction counts
//!
//! Only the pair with the deepest liquidity is read.
//!
//! API: https://api.dexscreener.com/latest/dex/tokens/{tokenAddress}
//! Free, no API key required

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::core::enricher::MetricsProvider;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::Metrics;
use crate::utils::constants::{short, DEXSCREENER_BASE_URL, FIVE_MIN_PER_HOUR, USER_AGENT};

/// DexScreener API response
#[derive(Debug, Deserialize)]
pub struct DexScreenerResponse {
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

/// A trading pair from DexScreener
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: String,
    #[serde(default)]
    pub pair_address: String,
    pub liquidity: Option<DexLiquidity>,
    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume: Option<DexVolume>,
    pub txns: Option<DexTxns>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    /// Fully diluted valuation, or the market cap field when fdv is absent or zero
    pub fn valuation(&self) -> f64 {
        match self.fdv {
            Some(fdv) if fdv > 0.0 => fdv,
            _ => self.market_cap.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexLiquidity {
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexVolume {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexTxns {
    pub m5: Option<DexTxnCount>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexTxnCount {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

/// Normalize a pair into [`Metrics`]
pub fn metrics_from_pair(pair: &DexPair) -> Metrics {
    let volume = pair.volume.clone().unwrap_or_default();
    let volume_1h = volume.h1.unwrap_or(0.0);
    let mut volume_5m = volume.m5.unwrap_or(0.0);
    if volume_5m == 0.0 && volume_1h > 0.0 {
        volume_5m = volume_1h / FIVE_MIN_PER_HOUR;
    }

    let m5 = pair.txns.as_ref().and_then(|t| t.m5.as_ref());

    Metrics {
        market_cap: pair.valuation(),
        volume_5m,
        volume_1h,
        buys_5m: m5.map(|c| c.buys),
        sells_5m: m5.map(|c| c.sells),
        ..Metrics::default()
    }
}

/// DexScreener API client
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        Self::with_base_url(DEXSCREENER_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetch all pairs for a token address
    /// Returns pairs sorted by liquidity (highest first)
    pub async fn get_token_pairs(&self, token_address: &str) -> AppResult<Vec<DexPair>> {
        let url = format!("{}/tokens/{}", self.base_url, token_address);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::source_status("dexscreener", response.status().as_u16()));
        }

        let data: DexScreenerResponse = response.json().await?;

        let mut pairs = data.pairs.unwrap_or_default();
        pairs.sort_by(|a, b| {
            b.liquidity_usd()
                .partial_cmp(&a.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!("📊 DexScreener: {} pairs for {}", pairs.len(), short(token_address));

        Ok(pairs)
    }

    /// The pair with the deepest liquidity, if the token trades anywhere
    pub async fn get_best_pair(&self, token_address: &str) -> AppResult<Option<DexPair>> {
        Ok(self.get_token_pairs(token_address).await?.into_iter().next())
    }
}

#[async_trait]
impl MetricsProvider for DexScreenerClient {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch_metrics(&self, address: &str) -> AppResult<Metrics> {
        match self.get_best_pair(address).await? {
            Some(pair) => Ok(metrics_from_pair(&pair)),
            None => Err(AppError::no_data(format!("dexscreener: no pairs for {}", address))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair(value: serde_json::Value) -> DexPair {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_metrics_from_pair() {
        let p = pair(json!({
            "chainId": "solana",
            "dexId": "pumpfun",
            "pairAddress": "pair",
            "liquidity": {"usd": 12000.0},
            "fdv": 42000.0,
            "marketCap": 40000.0,
            "volume": {"m5": 900.0, "h1": 5400.0, "h24": 30000.0},
            "txns": {"m5": {"buys": 14, "sells": 6}, "h1": {"buys": 80, "sells": 40}}
        }));

        let metrics = metrics_from_pair(&p);
        assert_eq!(metrics.market_cap, 42_000.0);
        assert_eq!(metrics.volume_5m, 900.0);
        assert_eq!(metrics.volume_1h, 5_400.0);
        assert_eq!(metrics.buys_5m, Some(14));
        assert_eq!(metrics.sells_5m, Some(6));
    }

    #[test]
    fn test_fdv_zero_falls_back_to_market_cap() {
        let p = pair(json!({"fdv": 0.0, "marketCap": 8000.0}));
        assert_eq!(metrics_from_pair(&p).market_cap, 8_000.0);

        let missing = pair(json!({}));
        assert_eq!(metrics_from_pair(&missing).market_cap, 0.0);
    }

    #[test]
    fn test_five_minute_volume_estimated_from_hour() {
        let p = pair(json!({"fdv": 10000.0, "volume": {"m5": 0.0, "h1": 1200.0}}));
        let metrics = metrics_from_pair(&p);
        assert_eq!(metrics.volume_5m, 100.0);
        assert_eq!(metrics.buys_5m, None);
    }
}
