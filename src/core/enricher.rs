//! Metric Enricher
//!
//! Walks an ordered chain of market-data providers and keeps the first answer
//! with a positive market cap. Holder enumeration and metadata come from
//! separate endpoints and are fetched independently.
//!
//! Nothing here returns an error to the caller: every failure degrades to
//! default values.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::config::MonitorConfig;
use crate::models::errors::AppResult;
use crate::models::types::{bonding_progress, Metrics, TokenMetadata};
use crate::utils::constants::short;

// ============================================
// CAPABILITIES
// ============================================

/// One valuation source in the enrichment chain
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Fetch metrics for a mint. A zero market cap counts as "no data".
    async fn fetch_metrics(&self, address: &str) -> AppResult<Metrics>;
}

/// Holder enumeration endpoint
#[async_trait]
pub trait HolderSource: Send + Sync {
    /// Number of holder accounts, capped at `limit`
    async fn count_holders(&self, mint: &str, limit: u32) -> AppResult<u64>;
}

/// Display-name lookup
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, mint: &str) -> AppResult<TokenMetadata>;
}

// ============================================
// ENRICHER
// ============================================

/// Ordered provider chain plus the holder and metadata lookups
#[derive(Clone)]
pub struct MetricsEnricher {
    providers: Vec<Arc<dyn MetricsProvider>>,
    holders: Option<Arc<dyn HolderSource>>,
    metadata: Option<Arc<dyn MetadataSource>>,
    holder_limit: u32,
    call_timeout: Duration,
}

impl MetricsEnricher {
    pub fn new(providers: Vec<Arc<dyn MetricsProvider>>) -> Self {
        let defaults = MonitorConfig::default();
        Self {
            providers,
            holders: None,
            metadata: None,
            holder_limit: defaults.holder_page_limit,
            call_timeout: defaults.http_timeout,
        }
    }

    pub fn with_holder_source(mut self, source: Arc<dyn HolderSource>, limit: u32) -> Self {
        self.holders = Some(source);
        self.holder_limit = limit.max(1);
        self
    }

    pub fn with_metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    /// Upper bound on any single call, on top of the HTTP client's own timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First usable answer from the chain, `None` if every source came up empty
    pub async fn try_enrich(&self, address: &str) -> Option<Metrics> {
        for provider in &self.providers {
            let attempt =
                tokio::time::timeout(self.call_timeout, provider.fetch_metrics(address)).await;

            match attempt {
                Ok(Ok(mut metrics)) if metrics.is_usable() => {
                    metrics.bonding_progress = bonding_progress(metrics.market_cap);
                    metrics.holder_count = metrics.holder_count.max(1);
                    debug!(
                        "📊 {} via {}: mcap ${:.0}",
                        short(address),
                        provider.name(),
                        metrics.market_cap
                    );
                    return Some(metrics);
                }
                Ok(Ok(_)) => {
                    debug!("📭 {} has no valuation for {}", provider.name(), short(address));
                }
                Ok(Err(e)) => {
                    debug!("⚠️ {} failed for {}: {}", provider.name(), short(address), e);
                }
                Err(_) => {
                    debug!("⏱️ {} timed out for {}", provider.name(), short(address));
                }
            }
        }
        None
    }

    /// Metrics for a mint, all zeros and one holder when nothing answered
    pub async fn enrich(&self, address: &str) -> Metrics {
        self.try_enrich(address).await.unwrap_or_default()
    }

    /// Holder count, at least 1. Failures count as a single holder.
    pub async fn fetch_holder_count(&self, address: &str) -> u64 {
        let Some(source) = &self.holders else {
            return 1;
        };

        match tokio::time::timeout(
            self.call_timeout,
            source.count_holders(address, self.holder_limit),
        )
        .await
        {
            Ok(Ok(count)) => count.max(1),
            Ok(Err(e)) => {
                debug!("⚠️ Holder lookup failed for {}: {}", short(address), e);
                1
            }
            Err(_) => {
                debug!("⏱️ Holder lookup timed out for {}", short(address));
                1
            }
        }
    }

    /// Name and symbol, "Unknown"/"???" when unavailable
    pub async fn fetch_metadata(&self, address: &str) -> TokenMetadata {
        let Some(source) = &self.metadata else {
            return TokenMetadata::default();
        };

        match tokio::time::timeout(self.call_timeout, source.fetch_metadata(address)).await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => {
                debug!("⚠️ Metadata lookup failed for {}: {}", short(address), e);
                TokenMetadata::default()
            }
            Err(_) => TokenMetadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixed {
        name: &'static str,
        market_cap: Option<f64>,
        calls: AtomicU32,
    }

    impl Fixed {
        fn new(name: &'static str, market_cap: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                name,
                market_cap,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl MetricsProvider for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_metrics(&self, _: &str) -> AppResult<Metrics> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.market_cap {
                Some(mcap) => Ok(Metrics {
                    market_cap: mcap,
                    volume_5m: 10.0,
                    holder_count: 0,
                    ..Metrics::default()
                }),
                None => Err(AppError::source_status(self.name, 500)),
            }
        }
    }

    struct Holders(AppResult<u64>);

    #[async_trait]
    impl HolderSource for Holders {
        async fn count_holders(&self, _: &str, limit: u32) -> AppResult<u64> {
            match &self.0 {
                Ok(n) => Ok((*n).min(limit as u64)),
                Err(_) => Err(AppError::timeout("holders")),
            }
        }
    }

    #[tokio::test]
    async fn test_first_positive_source_wins() {
        let first = Fixed::new("first", Some(0.0));
        let second = Fixed::new("second", Some(34_500.0));
        let third = Fixed::new("third", Some(99_000.0));
        let chain: Vec<Arc<dyn MetricsProvider>> = vec![first.clone(), second.clone(), third.clone()];
        let enricher = MetricsEnricher::new(chain);

        let metrics = enricher.enrich("mint").await;
        assert_eq!(metrics.market_cap, 34_500.0);
        assert_eq!(metrics.bonding_progress, 50.0);
        assert_eq!(metrics.holder_count, 1);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_defaults() {
        let chain: Vec<Arc<dyn MetricsProvider>> = vec![
            Fixed::new("a", None),
            Fixed::new("b", Some(-3.0)),
            Fixed::new("c", Some(f64::NAN)),
        ];
        let enricher = MetricsEnricher::new(chain);

        assert!(enricher.try_enrich("mint").await.is_none());
        assert_eq!(enricher.enrich("mint").await, Metrics::default());
    }

    #[tokio::test]
    async fn test_holder_count_floor_and_cap() {
        let base = MetricsEnricher::new(vec![]);
        assert_eq!(base.fetch_holder_count("mint").await, 1);

        let zero = base.clone().with_holder_source(Arc::new(Holders(Ok(0))), 1_000);
        assert_eq!(zero.fetch_holder_count("mint").await, 1);

        let capped = base.clone().with_holder_source(Arc::new(Holders(Ok(5_000))), 1_000);
        assert_eq!(capped.fetch_holder_count("mint").await, 1_000);

        let failing = base.with_holder_source(Arc::new(Holders(Err(AppError::timeout("x")))), 10);
        assert_eq!(failing.fetch_holder_count("mint").await, 1);
    }

    #[tokio::test]
    async fn test_metadata_defaults_without_source() {
        let enricher = MetricsEnricher::new(vec![]);
        let metadata = enricher.fetch_metadata("mint").await;
        assert_eq!(metadata.name, "Unknown");
        assert_eq!(metadata.symbol, "???");
    }
}
