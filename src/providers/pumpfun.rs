//! pump.fun frontend API - last-resort valuation source
//!
//! API: https://frontend-api.pump.fun/coins/{mint}
//! Valuation only. Runs on a shorter timeout than the other sources.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::core::enricher::MetricsProvider;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::Metrics;
use crate::utils::constants::{PUMP_FUN_API_BASE_URL, PUMP_FUN_TIMEOUT_SECS, USER_AGENT};

/// Subset of the coin record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PumpCoin {
    #[serde(default)]
    pub mint: String,
    pub usd_market_cap: Option<f64>,
    #[serde(default)]
    pub complete: bool,
}

pub struct PumpFunClient {
    client: reqwest::Client,
    base_url: String,
}

impl PumpFunClient {
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PUMP_FUN_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: PUMP_FUN_API_BASE_URL.to_string(),
        })
    }

    pub async fn get_coin(&self, mint: &str) -> AppResult<PumpCoin> {
        let url = format!("{}/coins/{}", self.base_url, mint);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::source_status("pumpfun", response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MetricsProvider for PumpFunClient {
    fn name(&self) -> &'static str {
        "pumpfun"
    }

    async fn fetch_metrics(&self, address: &str) -> AppResult<Metrics> {
        let coin = self.get_coin(address).await?;
        Ok(Metrics::with_market_cap(coin.usd_market_cap.unwrap_or(0.0)))
    }
}
