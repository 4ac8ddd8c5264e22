//! Solana JSON-RPC Provider
//!
//! HTTP client for the chain-data endpoint:
//! 1. Standard JSON-RPC - `getTransaction` with jsonParsed encoding
//! 2. DAS API - `getAsset` for name/symbol, `getTokenAccounts` for holders
//!
//! Helius serves both on the same URL.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::core::enricher::{HolderSource, MetadataSource};
use crate::core::resolver::{TransactionDetail, TransactionSource};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::TokenMetadata;
use crate::utils::constants::{short, COMMITMENT, USER_AGENT};

// ============================================
// DAS TYPES
// ============================================

/// Subset of a DAS asset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DasAsset {
    #[serde(default)]
    pub id: String,
    pub content: Option<AssetContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetContent {
    pub metadata: Option<AssetMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

impl DasAsset {
    /// Name and symbol, with defaults for whatever is missing or blank
    pub fn token_metadata(&self) -> TokenMetadata {
        let defaults = TokenMetadata::default();
        let metadata = self.content.as_ref().and_then(|c| c.metadata.as_ref());
        let pick = |value: Option<&String>, fallback: String| {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
                .unwrap_or(fallback)
        };
        TokenMetadata {
            name: pick(metadata.and_then(|m| m.name.as_ref()), defaults.name),
            symbol: pick(metadata.and_then(|m| m.symbol.as_ref()), defaults.symbol),
        }
    }
}

/// `getTokenAccounts` page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenAccountsPage {
    pub total: Option<u64>,
    #[serde(default)]
    pub token_accounts: Vec<DasTokenAccount>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DasTokenAccount {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub amount: u64,
}

// ============================================
// CLIENT
// ============================================

pub struct SolanaRpcClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            client,
        })
    }

    /// Execute a JSON-RPC call and return the raw `result`, which may be null
    async fn call_raw(&self, method: &str, params: serde_json::Value) -> AppResult<serde_json::Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self.client.post(&self.rpc_url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::source_status("rpc", status.as_u16()));
        }

        let mut json: serde_json::Value = response.json().await?;

        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| error.to_string());
            return Err(AppError::rpc_error(format!("{}: {}", method, message)));
        }

        match json.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(AppError::invalid_response(format!("{}: no result in response", method))),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> AppResult<T> {
        let result = self.call_raw(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    // ============================================
    // STANDARD RPC METHODS
    // ============================================

    pub async fn get_transaction(&self, signature: &str) -> AppResult<Option<TransactionDetail>> {
        let params = serde_json::json!([
            signature,
            {
                "encoding": "jsonParsed",
                "maxSupportedTransactionVersion": 0,
                "commitment": COMMITMENT
            }
        ]);

        let result = self.call_raw("getTransaction", params).await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }

    // ============================================
    // DAS API METHODS
    // ============================================

    pub async fn get_asset(&self, mint: &str) -> AppResult<DasAsset> {
        debug!("📊 Getting asset: {}", short(mint));
        self.call("getAsset", serde_json::json!({ "id": mint })).await
    }

    pub async fn get_token_accounts(&self, mint: &str, limit: u32) -> AppResult<TokenAccountsPage> {
        self.call(
            "getTokenAccounts",
            serde_json::json!({ "mint": mint, "limit": limit }),
        )
        .await
    }
}

#[async_trait]
impl TransactionSource for SolanaRpcClient {
    async fn get_transaction(&self, signature: &str) -> AppResult<Option<TransactionDetail>> {
        SolanaRpcClient::get_transaction(self, signature).await
    }
}

#[async_trait]
impl MetadataSource for SolanaRpcClient {
    async fn fetch_metadata(&self, mint: &str) -> AppResult<TokenMetadata> {
        Ok(self.get_asset(mint).await?.token_metadata())
    }
}

#[async_trait]
impl HolderSource for SolanaRpcClient {
    async fn count_holders(&self, mint: &str, limit: u32) -> AppResult<u64> {
        let page = self.get_token_accounts(mint, limit).await?;
        Ok(page.token_accounts.len() as u64)
    }
}
