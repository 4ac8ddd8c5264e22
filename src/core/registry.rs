//! Token Registry
//!
//! Authoritative map of tracked tokens. Every mutation goes through the
//! DashMap entry API and publishes its change event while the shard lock is
//! still held, so events for one address leave in the order the mutations
//! happened. Different addresses carry no ordering guarantee.
//!
//! Evicted addresses leave a tombstone behind. A tombstoned address is never
//! inserted again, so `Evicted` stays the last event for it.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::publisher::ChangePublisher;
use crate::models::types::{ChangeAction, Metrics, Token, TradeSide};
use crate::utils::constants::{short, EVICTED_TOMBSTONES_CAP};

/// Result of an insert-or-merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New entry, `Created` published
    Created,
    /// Existing entry merged, `Updated` published
    Updated,
    /// Existing or evicted entry left alone, nothing published
    Unchanged,
}

#[derive(Clone)]
pub struct TokenRegistry {
    tokens: Arc<DashMap<String, Token>>,
    evicted: Arc<DashMap<String, DateTime<Utc>>>,
    publisher: ChangePublisher,
}

impl TokenRegistry {
    pub fn new(publisher: ChangePublisher) -> Self {
        Self {
            tokens: Arc::new(DashMap::new()),
            evicted: Arc::new(DashMap::new()),
            publisher,
        }
    }

    // ============================================
    // MUTATIONS
    // ============================================

    /// Insert a token discovered through its creation event
    ///
    /// A second creation for a tracked address is a no-op, so duplicate
    /// notifications never produce a second `Created`.
    pub fn upsert_from_creation(&self, token: Token) -> Upsert {
        match self.tokens.entry(token.address.clone()) {
            Entry::Occupied(_) => {
                debug!("♻️ {} already tracked, creation ignored", short(&token.address));
                Upsert::Unchanged
            }
            Entry::Vacant(_) if self.was_evicted(&token.address) => {
                debug!("🪦 {} was evicted, creation ignored", short(&token.address));
                Upsert::Unchanged
            }
            Entry::Vacant(vacant) => {
                info!(
                    "🆕 {} ({}) tracked, mcap ${:.0}",
                    token.symbol,
                    short(&token.address),
                    token.market_cap
                );
                let inserted = vacant.insert(token);
                self.publisher
                    .publish(ChangeAction::Created, inserted.value().clone());
                Upsert::Created
            }
        }
    }

    /// Insert a token first seen through a trade, or count the trade
    ///
    /// `token` already has the triggering trade counted. If another task
    /// inserted the address in the meantime, only the trade is applied to the
    /// existing entry.
    pub fn upsert_from_trade(&self, token: Token, side: TradeSide) -> Upsert {
        match self.tokens.entry(token.address.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                existing.record_trade(side, token.last_update);
                let snapshot = existing.clone();
                self.publisher.publish(ChangeAction::Updated, snapshot);
                Upsert::Updated
            }
            Entry::Vacant(_) if self.was_evicted(&token.address) => {
                debug!("🪦 {} was evicted, {} ignored", short(&token.address), side.as_str());
                Upsert::Unchanged
            }
            Entry::Vacant(vacant) => {
                info!(
                    "🆕 {} ({}) tracked from {}, mcap ${:.0}",
                    token.symbol,
                    short(&token.address),
                    side.as_str(),
                    token.market_cap
                );
                let inserted = vacant.insert(token);
                self.publisher
                    .publish(ChangeAction::Created, inserted.value().clone());
                Upsert::Created
            }
        }
    }

    /// Count a trade on a tracked token. Unknown addresses are left alone.
    pub fn apply_trade(&self, address: &str, side: TradeSide, now: DateTime<Utc>) -> Option<Token> {
        let mut entry = self.tokens.get_mut(address)?;
        entry.record_trade(side, now);
        let snapshot = entry.value().clone();
        self.publisher.publish(ChangeAction::Updated, snapshot.clone());
        Some(snapshot)
    }

    /// Overwrite valuation fields from a refresh and publish `Updated`
    pub fn refresh_metrics(
        &self,
        address: &str,
        metrics: &Metrics,
        holders: u64,
        now: DateTime<Utc>,
    ) -> Option<Token> {
        let mut entry = self.tokens.get_mut(address)?;
        entry.apply_metrics(metrics, holders, now);
        let snapshot = entry.value().clone();
        self.publisher.publish(ChangeAction::Updated, snapshot.clone());
        Some(snapshot)
    }

    /// Replace the holder count, keep the valuation, and publish `Updated`
    pub fn refresh_holders(&self, address: &str, holders: u64, now: DateTime<Utc>) -> Option<Token> {
        let mut entry = self.tokens.get_mut(address)?;
        entry.set_holders(holders, now);
        let snapshot = entry.value().clone();
        self.publisher.publish(ChangeAction::Updated, snapshot.clone());
        Some(snapshot)
    }

    /// Bump last-update without publishing
    pub fn touch(&self, address: &str, now: DateTime<Utc>) -> bool {
        match self.tokens.get_mut(address) {
            Some(mut entry) => {
                entry.touch(now);
                true
            }
            None => false,
        }
    }

    /// Remove a token, leave a tombstone and publish `Evicted`
    pub fn evict(&self, address: &str) -> Option<Token> {
        match self.tokens.entry(address.to_string()) {
            Entry::Occupied(occupied) => {
                // tombstone goes in before the shard lock is released
                if self.evicted.len() >= EVICTED_TOMBSTONES_CAP {
                    debug!("🧹 Clearing {} eviction tombstones", self.evicted.len());
                    self.evicted.clear();
                }
                self.evicted.insert(address.to_string(), Utc::now());
                self.publisher
                    .publish(ChangeAction::Evicted, occupied.get().clone());
                Some(occupied.remove())
            }
            Entry::Vacant(_) => None,
        }
    }

    // ============================================
    // QUERIES
    // ============================================

    pub fn contains(&self, address: &str) -> bool {
        self.tokens.contains_key(address)
    }

    /// Whether the address was tracked once and has since been evicted
    pub fn was_evicted(&self, address: &str) -> bool {
        self.evicted.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<Token> {
        self.tokens.get(address).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Every tracked token, highest market cap first
    pub fn snapshots(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.tokens.iter().map(|e| e.value().clone()).collect();
        tokens.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));
        tokens
    }

    /// Up to `limit` tokens, least recently updated first
    pub fn stalest(&self, limit: usize) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.tokens.iter().map(|e| e.value().clone()).collect();
        tokens.sort_by(|a, b| {
            a.last_update
                .cmp(&b.last_update)
                .then_with(|| a.address.cmp(&b.address))
        });
        tokens.truncate(limit);
        tokens
    }

    pub fn publisher(&self) -> &ChangePublisher {
        &self.publisher
    }
}
