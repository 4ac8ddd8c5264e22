//! Transaction Resolver
//!
//! Fetches parsed transaction detail for a signature with a small, fixed
//! retry budget, then pulls the mint address out of it.
//!
//! Fresh transactions are often not queryable yet, so an empty answer is
//! retried. An explicit JSON-RPC error is treated as final.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::MonitorConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{short, INITIALIZE_MINT_TYPES, NATIVE_MINT};

// ============================================
// TRANSACTION TYPES (jsonParsed encoding)
// ============================================

/// Result of `getTransaction` with `encoding = jsonParsed`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    #[serde(default)]
    pub slot: u64,
    pub block_time: Option<i64>,
    pub meta: Option<TransactionMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub err: Option<serde_json::Value>,
    pub inner_instructions: Option<Vec<InnerInstructions>>,
    pub post_token_balances: Option<Vec<TokenBalance>>,
    pub log_messages: Option<Vec<String>>,
}

/// Inner instructions emitted by one top-level instruction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InnerInstructions {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

/// Instruction as returned by jsonParsed. `parsed` is absent for programs the
/// node cannot decode and may be a bare string for some (memo).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    pub program: Option<String>,
    pub program_id: Option<String>,
    pub parsed: Option<serde_json::Value>,
}

impl ParsedInstruction {
    pub fn instruction_type(&self) -> Option<&str> {
        self.parsed.as_ref()?.get("type")?.as_str()
    }

    pub fn info_str(&self, field: &str) -> Option<&str> {
        self.parsed.as_ref()?.get("info")?.get(field)?.as_str()
    }
}

/// Post-transaction token balance record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(default)]
    pub account_index: u32,
    #[serde(default)]
    pub mint: String,
    pub owner: Option<String>,
    pub ui_token_amount: Option<UiTokenAmount>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub decimals: u8,
    pub ui_amount: Option<f64>,
}

impl TransactionDetail {
    pub fn is_failed(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.err.as_ref())
            .is_some_and(|err| !err.is_null())
    }

    fn inner_instructions(&self) -> impl Iterator<Item = &ParsedInstruction> + '_ {
        self.meta
            .iter()
            .flat_map(|m| m.inner_instructions.iter().flatten())
            .flat_map(|set| set.instructions.iter())
    }

    fn post_token_balances(&self) -> impl Iterator<Item = &TokenBalance> + '_ {
        self.meta
            .iter()
            .flat_map(|m| m.post_token_balances.iter().flatten())
    }

    /// First post-balance mint that is not wrapped SOL
    fn first_non_native_mint(&self) -> Option<String> {
        self.post_token_balances()
            .map(|b| b.mint.as_str())
            .find(|mint| !mint.is_empty() && *mint != NATIVE_MINT)
            .map(String::from)
    }
}

// ============================================
// EXTRACTION
// ============================================

/// Mint created by a launch transaction
///
/// Looks for an initializeMint instruction first, then falls back to the
/// post-balance records since the instruction layout varies between program
/// versions.
pub fn extract_created_mint(detail: &TransactionDetail) -> Option<String> {
    detail
        .inner_instructions()
        .filter(|ix| {
            ix.instruction_type()
                .is_some_and(|t| INITIALIZE_MINT_TYPES.contains(&t))
        })
        .find_map(|ix| ix.info_str("mint").filter(|m| !m.is_empty()))
        .map(String::from)
        .or_else(|| detail.first_non_native_mint())
}

/// Mint traded in a buy/sell transaction
pub fn extract_trade_mint(detail: &TransactionDetail) -> Option<String> {
    detail.first_non_native_mint()
}

// ============================================
// RESOLVER
// ============================================

/// Chain-data endpoint able to return parsed transactions
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// `Ok(None)` when the endpoint does not know the signature (yet)
    async fn get_transaction(&self, signature: &str) -> AppResult<Option<TransactionDetail>>;
}

/// Bounded-retry transaction lookup
#[derive(Clone)]
pub struct TransactionResolver {
    source: Arc<dyn TransactionSource>,
    attempts: u32,
    retry_delay: Duration,
}

impl TransactionResolver {
    pub fn new(source: Arc<dyn TransactionSource>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            source,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(source: Arc<dyn TransactionSource>, config: &MonitorConfig) -> Self {
        Self::new(source, config.resolve_attempts, config.resolve_retry_delay)
    }

    /// Fetch the transaction, retrying empty and transient answers
    ///
    /// Every failure comes back as `TX_NOT_FOUND`. An explicit endpoint error
    /// ends the loop immediately and is attached as the source.
    pub async fn resolve(&self, signature: &str) -> AppResult<TransactionDetail> {
        for attempt in 1..=self.attempts {
            match self.source.get_transaction(signature).await {
                Ok(Some(detail)) => {
                    debug!("📄 Resolved {} on attempt {}", short(signature), attempt);
                    return Ok(detail);
                }
                Ok(None) => {
                    debug!(
                        "⏳ {} not indexed yet (attempt {}/{})",
                        short(signature),
                        attempt,
                        self.attempts
                    );
                }
                Err(e) if e.code.is_conclusive() => {
                    warn!("⚠️ {} rejected by endpoint: {}", short(signature), e);
                    return Err(AppError::with_source(
                        ErrorCode::TransactionNotFound,
                        format!("Transaction {} rejected by endpoint", signature),
                        e,
                    ));
                }
                Err(e) => {
                    debug!(
                        "⚠️ Lookup of {} failed (attempt {}/{}): {}",
                        short(signature),
                        attempt,
                        self.attempts,
                        e
                    );
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(AppError::transaction_not_found(signature))
    }

    /// Resolve and extract the created mint
    pub async fn resolve_created_mint(&self, signature: &str) -> AppResult<String> {
        let detail = self.resolve(signature).await?;
        extract_created_mint(&detail).ok_or_else(|| AppError::mint_not_found(signature))
    }

    /// Resolve and extract the traded mint
    pub async fn resolve_trade_mint(&self, signature: &str) -> AppResult<String> {
        let detail = self.resolve(signature).await?;
        extract_trade_mint(&detail).ok_or_else(|| AppError::mint_not_found(signature))
    }
}
