//! Consumer-side token cache
//!
//! The presentation side never reads the registry directly. It keeps its own
//! copy of every token it has been told about, fed by the change bridge.
//!
//! Features:
//! - Retention-based expiry, measured from each token's `created_at` and read
//!   from the shared refresh settings on every check
//! - Thread-safe with DashMap
//! - Eviction counter for the stats line

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::models::config::{RefreshSettings, SharedRefresh};
use crate::models::types::Token;
use crate::utils::constants::short;

/// Address-keyed copy of the tracked set
#[derive(Clone)]
pub struct TokenCache {
    store: Arc<DashMap<String, Token>>,
    settings: SharedRefresh,
    evictions: Arc<AtomicU64>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::with_settings(SharedRefresh::default())
    }
}

impl TokenCache {
    /// Cache with a fixed retention window
    pub fn new(retention: Duration) -> Self {
        Self::with_settings(SharedRefresh::new(RefreshSettings {
            retention,
            ..RefreshSettings::default()
        }))
    }

    /// Cache following the same retention handle as the refresh scheduler
    pub fn with_settings(settings: SharedRefresh) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            settings,
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn retention(&self) -> Duration {
        self.settings.load().retention
    }

    /// Older than the retention window at `now`
    pub fn is_expired(&self, token: &Token, now: DateTime<Utc>) -> bool {
        token.age(now) > self.retention()
    }

    pub fn get(&self, address: &str) -> Option<Token> {
        self.store.get(address).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.store.contains_key(address)
    }

    /// Insert or replace. Returns true if the address was not cached before.
    pub fn upsert(&self, token: Token) -> bool {
        self.store.insert(token.address.clone(), token).is_none()
    }

    pub fn remove(&self, address: &str) -> Option<Token> {
        let removed = self.store.remove(address).map(|(_, token)| token);
        if removed.is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("🗑️ CACHE EVICT: {}", short(address));
        }
        removed
    }

    /// Remove and return every entry past retention
    pub fn drain_expired(&self, now: DateTime<Utc>) -> Vec<Token> {
        let retention = self.retention();
        let expired: Vec<String> = self
            .store
            .iter()
            .filter(|entry| entry.value().age(now) > retention)
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .iter()
            .filter_map(|address| self.remove(address))
            .collect()
    }

    /// All cached tokens, highest market cap first
    pub fn snapshot(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.store.iter().map(|e| e.value().clone()).collect();
        tokens.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));
        tokens
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            retention_secs: self.retention().num_seconds().max(0) as u64,
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub evictions: u64,
    pub retention_secs: u64,
}
