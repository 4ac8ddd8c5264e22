//! Birdeye token overview - secondary valuation source
//!
//! API: https://public-api.birdeye.so/defi/token_overview?address={mint}
//! Requires an API key; the 24h volume is scaled down to a 5 minute estimate.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::core::enricher::MetricsProvider;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::Metrics;
use crate::utils::constants::{BIRDEYE_BASE_URL, FIVE_MIN_PER_DAY, USER_AGENT};

#[derive(Debug, Deserialize)]
pub struct BirdeyeResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Option<TokenOverview>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOverview {
    pub market_cap: Option<f64>,
    /// Older responses carry the valuation here, some carry both
    pub mc: Option<f64>,
    #[serde(rename = "v24hUSD")]
    pub volume_24h_usd: Option<f64>,
    #[serde(rename = "v1hUSD")]
    pub volume_1h_usd: Option<f64>,
    pub holder: Option<u64>,
}

impl TokenOverview {
    /// First positive of `marketCap` and `mc`, otherwise 0
    pub fn valuation(&self) -> f64 {
        [self.market_cap, self.mc]
            .into_iter()
            .flatten()
            .find(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(0.0)
    }

    pub fn to_metrics(&self) -> Metrics {
        Metrics {
            market_cap: self.valuation(),
            volume_5m: self.volume_24h_usd.unwrap_or(0.0) / FIVE_MIN_PER_DAY,
            volume_1h: self.volume_1h_usd.unwrap_or(0.0),
            holder_count: self.holder.unwrap_or(0).max(1),
            ..Metrics::default()
        }
    }
}

pub struct BirdeyeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BirdeyeClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: BIRDEYE_BASE_URL.to_string(),
            api_key,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn token_overview(&self, address: &str) -> AppResult<TokenOverview> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::source_disabled("birdeye"));
        };

        let url = format!("{}/token_overview", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("address", address)])
            .header("X-API-KEY", api_key)
            .header("x-chain", "solana")
            .header("accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::source_status("birdeye", response.status().as_u16()));
        }

        let body: BirdeyeResponse = response.json().await?;
        match body.data {
            Some(overview) if body.success => Ok(overview),
            _ => Err(AppError::no_data(format!("birdeye: no overview for {}", address))),
        }
    }
}

#[async_trait]
impl MetricsProvider for BirdeyeClient {
    fn name(&self) -> &'static str {
        "birdeye"
    }

    async fn fetch_metrics(&self, address: &str) -> AppResult<Metrics> {
        Ok(self.token_overview(address).await?.to_metrics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overview_to_metrics() {
        let body: BirdeyeResponse = serde_json::from_value(json!({
            "success": true,
            "data": {"mc": 28800.0, "v24hUSD": 57600.0, "v1hUSD": 3000.0, "holder": 87}
        }))
        .unwrap();
        let metrics = body.data.unwrap().to_metrics();
        assert_eq!(metrics.market_cap, 28_800.0);
        assert_eq!(metrics.volume_5m, 200.0);
        assert_eq!(metrics.volume_1h, 3_000.0);
        assert_eq!(metrics.holder_count, 87);
    }

    #[test]
    fn test_overview_market_cap_field_name() {
        let overview: TokenOverview =
            serde_json::from_value(json!({"marketCap": 9000.0})).unwrap();
        let metrics = overview.to_metrics();
        assert_eq!(metrics.market_cap, 9_000.0);
        assert_eq!(metrics.holder_count, 1);
    }

    #[test]
    fn test_overview_with_both_market_cap_fields() {
        let overview: TokenOverview =
            serde_json::from_value(json!({"marketCap": 0.0, "mc": 15400.0})).unwrap();
        assert_eq!(overview.valuation(), 15_400.0);

        let overview: TokenOverview =
            serde_json::from_value(json!({"marketCap": 12000.0, "mc": 15400.0})).unwrap();
        assert_eq!(overview.valuation(), 12_000.0);
    }

    #[tokio::test]
    async fn test_disabled_without_key() {
        let client = BirdeyeClient::new(None, Duration::from_secs(1)).unwrap();
        assert!(!client.is_enabled());
        let err = client.fetch_metrics("mint").await.unwrap_err();
        assert_eq!(err.code_str(), "SOURCE_DISABLED");
    }
}
