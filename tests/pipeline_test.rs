//! Pipeline Integration Tests
//!
//! Drive classifier -> resolver -> enricher -> registry -> publisher with
//! in-process sources. No network, no sleeps.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pumpscope::core::{
    change_channel, ChangeFeed, EventProcessor, HolderSource, MetadataSource, MetricsEnricher,
    MetricsProvider, Outcome, RefreshScheduler, SchedulerSettings, Shutdown, TokenRegistry,
    TransactionDetail, TransactionResolver, TransactionSource,
};
use pumpscope::models::{
    AppError, AppResult, ChangeAction, Metrics, RefreshSettings, SharedRefresh, SharedThresholds,
    Thresholds, Token, TokenMetadata,
};
use pumpscope::providers::LogNotification;
use pumpscope::telemetry::PipelineStats;
use pumpscope::utils::NATIVE_MINT;

// ============================================
// FAKE SOURCES
// ============================================

#[derive(Default)]
struct FakeChain {
    transactions: Mutex<HashMap<String, serde_json::Value>>,
    lookups: AtomicU32,
}

impl FakeChain {
    fn add_creation(&self, signature: &str, mint: &str) {
        let tx = json!({
            "slot": 1,
            "meta": {
                "err": null,
                "innerInstructions": [{
                    "index": 0,
                    "instructions": [{
                        "program": "spl-token",
                        "parsed": {"type": "initializeMint2", "info": {"mint": mint, "decimals": 6}}
                    }]
                }],
                "postTokenBalances": []
            }
        });
        self.transactions.lock().unwrap().insert(signature.to_string(), tx);
    }

    fn add_trade(&self, signature: &str, mint: &str) {
        let tx = json!({
            "slot": 2,
            "meta": {
                "err": null,
                "postTokenBalances": [
                    {"accountIndex": 1, "mint": NATIVE_MINT, "owner": "trader"},
                    {"accountIndex": 2, "mint": mint, "owner": "trader"}
                ]
            }
        });
        self.transactions.lock().unwrap().insert(signature.to_string(), tx);
    }
}

#[async_trait]
impl TransactionSource for FakeChain {
    async fn get_transaction(&self, signature: &str) -> AppResult<Option<TransactionDetail>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let found = self.transactions.lock().unwrap().get(signature).cloned();
        match found {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

/// Valuation source with a per-mint market cap; unknown mints report zero
struct FakeMarket {
    name: &'static str,
    caps: Mutex<HashMap<String, f64>>,
    calls: AtomicU32,
}

impl FakeMarket {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            caps: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
        })
    }

    fn set(&self, mint: &str, market_cap: f64) {
        self.caps.lock().unwrap().insert(mint.to_string(), market_cap);
    }
}

#[async_trait]
impl MetricsProvider for FakeMarket {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_metrics(&self, address: &str) -> AppResult<Metrics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let cap = self.caps.lock().unwrap().get(address).copied().unwrap_or(0.0);
        Ok(Metrics {
            market_cap: cap,
            volume_5m: 1_500.0,
            volume_1h: 9_000.0,
            holder_count: 4,
            ..Metrics::default()
        })
    }
}

struct Offline;

#[async_trait]
impl MetricsProvider for Offline {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn fetch_metrics(&self, _: &str) -> AppResult<Metrics> {
        Err(AppError::source_status("offline", 503))
    }
}

struct FixedHolders(u64);

#[async_trait]
impl HolderSource for FixedHolders {
    async fn count_holders(&self, _: &str, limit: u32) -> AppResult<u64> {
        Ok(self.0.min(limit as u64))
    }
}

struct FixedMetadata;

#[async_trait]
impl MetadataSource for FixedMetadata {
    async fn fetch_metadata(&self, _: &str) -> AppResult<TokenMetadata> {
        Ok(TokenMetadata {
            name: "Test Coin".to_string(),
            symbol: "TEST".to_string(),
        })
    }
}

// ============================================
// HARNESS
// ============================================

struct Harness {
    chain: Arc<FakeChain>,
    market: Arc<FakeMarket>,
    registry: TokenRegistry,
    feed: ChangeFeed,
    processor: EventProcessor,
    enricher: MetricsEnricher,
    stats: Arc<PipelineStats>,
    refresh: SharedRefresh,
}

fn harness_with(providers: Vec<Arc<dyn MetricsProvider>>, market: Arc<FakeMarket>) -> Harness {
    let chain = Arc::new(FakeChain::default());
    let (publisher, feed) = change_channel();
    let registry = TokenRegistry::new(publisher);
    let stats = PipelineStats::new();

    let enricher = MetricsEnricher::new(providers)
        .with_holder_source(Arc::new(FixedHolders(25)), 1_000)
        .with_metadata_source(Arc::new(FixedMetadata));
    let resolver = TransactionResolver::new(chain.clone(), 3, Duration::ZERO);
    let processor = EventProcessor::new(
        resolver,
        enricher.clone(),
        registry.clone(),
        stats.clone(),
        Duration::ZERO,
    );

    Harness {
        chain,
        market,
        registry,
        feed,
        processor,
        enricher,
        stats,
        refresh: SharedRefresh::default(),
    }
}

fn harness() -> Harness {
    let market = FakeMarket::new("market");
    let providers: Vec<Arc<dyn MetricsProvider>> = vec![market.clone()];
    harness_with(providers, market)
}

impl Harness {
    fn scheduler(&self, batch_size: usize) -> RefreshScheduler {
        self.refresh.store(RefreshSettings {
            interval: Duration::from_secs(8),
            batch_size,
            retention: ChronoDuration::minutes(30),
        });
        RefreshScheduler::new(
            self.registry.clone(),
            self.enricher.clone(),
            SharedThresholds::new(Thresholds::default()),
            SchedulerSettings::new(Duration::ZERO, self.refresh.clone()),
            self.stats.clone(),
            Shutdown::new(),
        )
    }

    fn actions_for(&mut self, address: &str) -> Vec<ChangeAction> {
        self.feed
            .drain()
            .into_iter()
            .filter(|e| e.token.address == address)
            .map(|e| e.action)
            .collect()
    }
}

fn notification(signature: &str, marker: &str) -> LogNotification {
    LogNotification::new(
        signature,
        vec![
            "Program 6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P invoke [1]".to_string(),
            format!("Program log: Instruction: {}", marker),
            "Program 6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P success".to_string(),
        ],
        false,
    )
}

// ============================================
// EVENT HANDLING
// ============================================

#[tokio::test]
async fn test_duplicate_creation_publishes_once() {
    let mut h = harness();
    h.chain.add_creation("sig-create", "MintA");
    h.chain.add_creation("sig-create-again", "MintA");
    h.market.set("MintA", 12_000.0);

    let first = h.processor.handle(notification("sig-create", "Create")).await;
    let replay = h.processor.handle(notification("sig-create", "Create")).await;
    let second_sig = h.processor.handle(notification("sig-create-again", "Create")).await;

    assert_eq!(first, Outcome::Created("MintA".to_string()));
    assert_eq!(replay, Outcome::Duplicate);
    assert_eq!(second_sig, Outcome::AlreadyTracked("MintA".to_string()));
    assert_eq!(h.actions_for("MintA"), vec![ChangeAction::Created]);

    let token = h.registry.get("MintA").unwrap();
    assert_eq!(token.symbol, "TEST");
    assert_eq!(token.market_cap, 12_000.0);
    assert_eq!((token.buys, token.sells), (0, 0));
    assert!(token.holders >= 1);
    assert_eq!(h.stats.snapshot().duplicates, 1);
}

#[tokio::test]
async fn test_failed_and_unmarked_events_are_ignored() {
    let mut h = harness();
    h.chain.add_creation("sig-failed", "MintA");

    let mut failed = notification("sig-failed", "Create");
    failed.failed = true;
    let noise = LogNotification::new(
        "sig-noise",
        vec!["Program log: Instruction: SetParams".to_string()],
        false,
    );

    assert_eq!(h.processor.handle(failed).await, Outcome::Ignored);
    assert_eq!(h.processor.handle(noise).await, Outcome::Ignored);
    assert_eq!(h.chain.lookups.load(Ordering::SeqCst), 0);
    assert!(h.registry.is_empty());
    assert!(h.feed.drain().is_empty());
}

#[tokio::test]
async fn test_unresolvable_event_is_dropped_silently() {
    let mut h = harness();

    let outcome = h.processor.handle(notification("sig-unknown", "Buy")).await;

    assert_eq!(outcome, Outcome::Dropped);
    assert_eq!(h.chain.lookups.load(Ordering::SeqCst), 3);
    assert!(h.registry.is_empty());
    assert!(h.feed.drain().is_empty());
    assert_eq!(h.stats.snapshot().dropped, 1);
}

#[tokio::test]
async fn test_trade_on_unknown_mint_creates_it() {
    let mut h = harness();
    h.chain.add_trade("sig-buy", "MintB");
    h.chain.add_trade("sig-sell", "MintS");
    h.chain.add_trade("sig-buy-2", "MintB");
    h.market.set("MintB", 7_000.0);

    let bought = h.processor.handle(notification("sig-buy", "Buy")).await;
    let sold = h.processor.handle(notification("sig-sell", "Sell")).await;

    assert_eq!(bought, Outcome::Created("MintB".to_string()));
    assert_eq!(sold, Outcome::Created("MintS".to_string()));

    let b = h.registry.get("MintB").unwrap();
    assert_eq!((b.buys, b.sells), (1, 0));
    assert_eq!(b.market_cap, 7_000.0);
    let s = h.registry.get("MintS").unwrap();
    assert_eq!((s.buys, s.sells), (0, 1));

    let again = h.processor.handle(notification("sig-buy-2", "Buy")).await;
    assert_eq!(again, Outcome::Updated("MintB".to_string()));
    assert_eq!(h.registry.get("MintB").unwrap().buys, 2);

    assert_eq!(
        h.actions_for("MintB"),
        vec![ChangeAction::Created, ChangeAction::Updated]
    );
}

#[tokio::test]
async fn test_concurrent_trades_create_once() {
    let mut h = harness();
    for i in 0..8 {
        h.chain.add_trade(&format!("sig-{}", i), "MintRace");
    }

    let mut handles = Vec::new();
    for i in 0..8 {
        let processor = h.processor.clone();
        handles.push(tokio::spawn(async move {
            processor.handle(notification(&format!("sig-{}", i), "Buy")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let token = h.registry.get("MintRace").unwrap();
    assert_eq!(token.buys, 8);

    let actions = h.actions_for("MintRace");
    assert_eq!(actions.iter().filter(|a| **a == ChangeAction::Created).count(), 1);
    assert_eq!(actions[0], ChangeAction::Created);
    assert_eq!(actions.len(), 8);
}

#[tokio::test]
async fn test_source_chain_stops_at_first_positive() {
    let zero = FakeMarket::new("zero");
    let second = FakeMarket::new("second");
    let third = FakeMarket::new("third");
    second.set("MintC", 34_500.0);
    third.set("MintC", 60_000.0);

    let providers: Vec<Arc<dyn MetricsProvider>> =
        vec![Arc::new(Offline), zero.clone(), second.clone(), third.clone()];
    let h = harness_with(providers, second.clone());
    h.chain.add_creation("sig-c", "MintC");

    h.processor.handle(notification("sig-c", "Create")).await;

    let token = h.registry.get("MintC").unwrap();
    assert_eq!(token.market_cap, 34_500.0);
    assert_eq!(token.bonding_progress, 50.0);
    assert_eq!(zero.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    assert_eq!(third.calls.load(Ordering::SeqCst), 0);
}

// ============================================
// REFRESH CYCLE
// ============================================

#[tokio::test]
async fn test_refresh_takes_stalest_batch() {
    let mut h = harness();
    let t0 = Utc::now() - ChronoDuration::minutes(5);

    for i in 0..12 {
        let address = format!("Mint{:02}", i);
        let mut token = Token::new(address.clone(), t0);
        token.last_update = t0 + ChronoDuration::seconds(i);
        h.registry.upsert_from_creation(token);
        h.market.set(&address, 20_000.0);
    }
    h.feed.drain();

    let report = h.scheduler(10).run_cycle(Utc::now()).await;

    assert_eq!(report.selected, 10);
    assert_eq!(report.refreshed, 10);
    for i in 0..10 {
        let token = h.registry.get(&format!("Mint{:02}", i)).unwrap();
        assert_eq!(token.market_cap, 20_000.0);
        assert_eq!(token.holders, 25);
    }
    for i in 10..12 {
        let token = h.registry.get(&format!("Mint{:02}", i)).unwrap();
        assert_eq!(token.market_cap, 0.0);
        assert_eq!(token.last_update, t0 + ChronoDuration::seconds(i));
    }
    assert_eq!(h.feed.drain().len(), 10);
}

#[tokio::test]
async fn test_token_above_floor_kept_until_retention() {
    let mut h = harness();
    let now = Utc::now();
    h.registry
        .upsert_from_creation(Token::new("MintKeep", now - ChronoDuration::minutes(10)));
    h.market.set("MintKeep", 2_000.0);
    let scheduler = h.scheduler(10);

    let report = scheduler.run_cycle(now).await;
    assert_eq!(report.refreshed, 1);
    assert!(h.registry.contains("MintKeep"));

    let report = scheduler.run_cycle(now + ChronoDuration::minutes(21)).await;
    assert_eq!(report.evicted_aged, 1);
    assert!(!h.registry.contains("MintKeep"));

    assert_eq!(
        h.actions_for("MintKeep"),
        vec![ChangeAction::Created, ChangeAction::Updated, ChangeAction::Evicted]
    );
}

#[tokio::test]
async fn test_refresh_below_floor_evicts() {
    let mut h = harness();
    h.chain.add_creation("sig-d", "MintDump");
    h.chain.add_trade("sig-d-buy", "MintDump");
    h.market.set("MintDump", 9_000.0);

    h.processor.handle(notification("sig-d", "Create")).await;
    h.processor.handle(notification("sig-d-buy", "Buy")).await;

    h.market.set("MintDump", 500.0);
    let report = h.scheduler(10).run_cycle(Utc::now()).await;

    assert_eq!(report.evicted_floor, 1);
    assert!(!h.registry.contains("MintDump"));
    assert_eq!(
        h.actions_for("MintDump"),
        vec![ChangeAction::Created, ChangeAction::Updated, ChangeAction::Evicted]
    );
    assert_eq!(h.stats.snapshot().evicted_floor, 1);
}

#[tokio::test]
async fn test_refresh_with_no_answer_keeps_valuation() {
    let mut h = harness();
    let t0 = Utc::now() - ChronoDuration::minutes(2);
    let mut token = Token::new("MintQuiet", t0);
    token.market_cap = 15_000.0;
    h.registry.upsert_from_creation(token);
    h.feed.drain();

    let report = h.scheduler(10).run_cycle(Utc::now()).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.refreshed, 0);
    let token = h.registry.get("MintQuiet").unwrap();
    assert_eq!(token.market_cap, 15_000.0);
    assert_eq!(token.holders, 25);
    assert!(token.last_update > t0);
    assert_eq!(h.actions_for("MintQuiet"), vec![ChangeAction::Updated]);
}

#[tokio::test]
async fn test_trade_after_eviction_does_not_recreate() {
    let mut h = harness();
    h.chain.add_trade("sig-z-1", "MintZ");
    h.chain.add_trade("sig-z-2", "MintZ");
    h.chain.add_creation("sig-z-create", "MintZ");
    h.market.set("MintZ", 8_000.0);

    let first = h.processor.handle(notification("sig-z-1", "Buy")).await;
    assert_eq!(first, Outcome::Created("MintZ".to_string()));

    let report = h
        .scheduler(10)
        .run_cycle(Utc::now() + ChronoDuration::minutes(31))
        .await;
    assert_eq!(report.evicted_aged, 1);

    let second = h.processor.handle(notification("sig-z-2", "Buy")).await;
    let late_create = h.processor.handle(notification("sig-z-create", "Create")).await;

    assert_eq!(second, Outcome::Retired("MintZ".to_string()));
    assert_eq!(late_create, Outcome::Retired("MintZ".to_string()));
    assert!(!h.registry.contains("MintZ"));
    assert_eq!(
        h.actions_for("MintZ"),
        vec![ChangeAction::Created, ChangeAction::Evicted]
    );
    assert_eq!(h.stats.snapshot().created, 1);
}

#[tokio::test]
async fn test_refresh_settings_apply_on_next_cycle() {
    let mut h = harness();
    let now = Utc::now();
    for address in ["MintR1", "MintR2", "MintR3"] {
        h.registry
            .upsert_from_creation(Token::new(address, now - ChronoDuration::minutes(10)));
        h.market.set(address, 20_000.0);
    }
    h.feed.drain();
    let scheduler = h.scheduler(1);

    let report = scheduler.run_cycle(now).await;
    assert_eq!(report.selected, 1);
    assert_eq!(report.refreshed, 1);

    h.refresh.store(RefreshSettings {
        interval: Duration::from_secs(8),
        batch_size: 3,
        retention: ChronoDuration::minutes(5),
    });

    let report = scheduler.run_cycle(now).await;
    assert_eq!(report.selected, 3);
    assert_eq!(report.evicted_aged, 3);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_empty_registry_cycle_is_idle() {
    let h = harness();
    let report = h.scheduler(10).run_cycle(Utc::now()).await;
    assert!(report.is_idle());
    assert_eq!(h.market.calls.load(Ordering::SeqCst), 0);
}
