//! Event Processor
//!
//! Turns one log notification into at most one registry mutation:
//! classify, resolve the transaction, enrich, then upsert. Every failure is
//! absorbed here and reported as a dropped event.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::classifier::{classify, EventKind};
use crate::core::enricher::MetricsEnricher;
use crate::core::registry::{TokenRegistry, Upsert};
use crate::core::resolver::TransactionResolver;
use crate::models::config::MonitorConfig;
use crate::models::types::{Token, TradeSide};
use crate::providers::websocket::LogNotification;
use crate::telemetry::PipelineStats;
use crate::utils::constants::{short, SEEN_SIGNATURES_CAP};

/// What handling a notification did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Failed transaction or no marker
    Ignored,
    /// Signature already handled
    Duplicate,
    /// Resolution or extraction failed
    Dropped,
    /// Creation for an address that is already tracked
    AlreadyTracked(String),
    /// New token inserted
    Created(String),
    /// Trade counted on a tracked token
    Updated(String),
    /// Address was evicted earlier and is not tracked again
    Retired(String),
}

#[derive(Clone)]
pub struct EventProcessor {
    resolver: TransactionResolver,
    enricher: MetricsEnricher,
    registry: TokenRegistry,
    stats: Arc<PipelineStats>,
    seen: Arc<DashMap<String, ()>>,
    settle_delay: Duration,
}

impl EventProcessor {
    pub fn new(
        resolver: TransactionResolver,
        enricher: MetricsEnricher,
        registry: TokenRegistry,
        stats: Arc<PipelineStats>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            resolver,
            enricher,
            registry,
            stats,
            seen: Arc::new(DashMap::new()),
            settle_delay,
        }
    }

    pub fn from_config(
        config: &MonitorConfig,
        resolver: TransactionResolver,
        enricher: MetricsEnricher,
        registry: TokenRegistry,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self::new(resolver, enricher, registry, stats, config.settle_delay)
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Record a signature, returning false if it was already seen
    fn first_sighting(&self, signature: &str) -> bool {
        if self.seen.insert(signature.to_string(), ()).is_some() {
            return false;
        }
        if self.seen.len() > SEEN_SIGNATURES_CAP {
            debug!("🧹 Clearing {} seen signatures", self.seen.len());
            self.seen.clear();
            self.seen.insert(signature.to_string(), ());
        }
        true
    }

    pub async fn handle(&self, notification: LogNotification) -> Outcome {
        self.stats.record_notification();

        if !self.first_sighting(&notification.signature) {
            self.stats.record_duplicate();
            return Outcome::Duplicate;
        }

        let kind = classify(&notification.logs, notification.failed);
        self.stats.record_classified(kind);

        match kind {
            EventKind::Ignore => Outcome::Ignored,
            EventKind::Creation => self.handle_creation(&notification.signature).await,
            EventKind::Buy => self.handle_trade(&notification.signature, TradeSide::Buy).await,
            EventKind::Sell => self.handle_trade(&notification.signature, TradeSide::Sell).await,
        }
    }

    async fn handle_creation(&self, signature: &str) -> Outcome {
        // indexer lag: resolving immediately almost always comes back empty
        tokio::time::sleep(self.settle_delay).await;

        let mint = match self.resolver.resolve_created_mint(signature).await {
            Ok(mint) => mint,
            Err(e) => {
                debug!("🗑️ Creation {} dropped: {}", short(signature), e);
                self.stats.record_dropped();
                return Outcome::Dropped;
            }
        };

        if self.registry.contains(&mint) {
            return Outcome::AlreadyTracked(mint);
        }
        if self.registry.was_evicted(&mint) {
            return Outcome::Retired(mint);
        }

        let (metadata, metrics) =
            tokio::join!(self.enricher.fetch_metadata(&mint), self.enricher.enrich(&mint));
        let token = Token::discovered(mint.clone(), metadata, &metrics, Utc::now());

        match self.registry.upsert_from_creation(token) {
            Upsert::Created => {
                self.stats.record_created();
                Outcome::Created(mint)
            }
            Upsert::Unchanged if self.registry.was_evicted(&mint) => Outcome::Retired(mint),
            Upsert::Updated | Upsert::Unchanged => Outcome::AlreadyTracked(mint),
        }
    }

    async fn handle_trade(&self, signature: &str, side: TradeSide) -> Outcome {
        let mint = match self.resolver.resolve_trade_mint(signature).await {
            Ok(mint) => mint,
            Err(e) => {
                debug!("🗑️ {} {} dropped: {}", side.as_str(), short(signature), e);
                self.stats.record_dropped();
                return Outcome::Dropped;
            }
        };

        if self.registry.apply_trade(&mint, side, Utc::now()).is_some() {
            self.stats.record_updated();
            return Outcome::Updated(mint);
        }
        if self.registry.was_evicted(&mint) {
            debug!("🪦 {} on evicted {} ignored", side.as_str(), short(&mint));
            return Outcome::Retired(mint);
        }

        // first sighting through a trade: the creation was missed or is late
        let (metadata, metrics) =
            tokio::join!(self.enricher.fetch_metadata(&mint), self.enricher.enrich(&mint));
        let now = Utc::now();
        let mut token = Token::discovered(mint.clone(), metadata, &metrics, now);
        token.record_trade(side, now);

        match self.registry.upsert_from_trade(token, side) {
            Upsert::Created => {
                info!("🔎 {} discovered via {}", short(&mint), side.as_str());
                self.stats.record_created();
                Outcome::Created(mint)
            }
            Upsert::Updated => {
                self.stats.record_updated();
                Outcome::Updated(mint)
            }
            Upsert::Unchanged => Outcome::Retired(mint),
        }
    }
}
