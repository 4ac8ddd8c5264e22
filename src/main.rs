//! Pumpscope - real-time pump.fun launch monitor
//!
//! Wires the pipeline together and owns what the core leaves out:
//! - Reconnect policy (exponential backoff, bounded consecutive failures)
//! - Graceful shutdown on Ctrl+C
//! - Final statistics

use pumpscope::core::{
    change_channel, AlertConsumer, ChangeBridge, EventProcessor, ListenerSettings,
    MetricsEnricher, MetricsProvider, RefreshScheduler, SchedulerSettings, Shutdown,
    SubscriptionListener, TokenRegistry, TransactionResolver,
};
use pumpscope::models::{
    MonitorConfig, RefreshSettings, SharedRefresh, SharedThresholds, Thresholds,
};
use pumpscope::providers::{BirdeyeClient, DexScreenerClient, PumpFunClient, SolanaRpcClient};
use pumpscope::telemetry::{spawn_stats_printer, PipelineStats};
use pumpscope::utils::{mask_url, TokenCache, APP_NAME, APP_VERSION};

use eyre::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Reconnection base delay (milliseconds)
const RECONNECT_BASE_MS: u64 = 1000;

/// Maximum reconnection delay (milliseconds)
const RECONNECT_MAX_MS: u64 = 30000;

/// Jitter percentage applied to each reconnect delay
const RECONNECT_JITTER_PERCENT: u64 = 20;

/// Consecutive failed sessions before giving up
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Period of the one-line stats log
const STATS_EVERY: Duration = Duration::from_secs(60);

/// Reconnect delay with a random ±20% spread
fn with_jitter(delay_ms: u64) -> u64 {
    let range = (delay_ms * RECONNECT_JITTER_PERCENT / 100) as i64;
    let jitter: i64 = rand::thread_rng().gen_range(-range..=range);
    (delay_ms as i64 + jitter).max(100) as u64
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    info!("🚀 {} v{} starting", APP_NAME, APP_VERSION);

    let config = MonitorConfig::from_env()?;
    let thresholds = SharedThresholds::new(Thresholds::from_env());
    let refresh = SharedRefresh::new(RefreshSettings::from_config(&config));
    let stats = PipelineStats::new();
    let shutdown = Shutdown::new();

    // ============================================
    // Providers
    // ============================================
    let rpc = Arc::new(SolanaRpcClient::new(config.rpc_url.clone(), config.http_timeout)?);

    let mut chain: Vec<Arc<dyn MetricsProvider>> =
        vec![Arc::new(DexScreenerClient::new(config.http_timeout)?)];
    if config.birdeye_api_key.is_some() {
        chain.push(Arc::new(BirdeyeClient::new(
            config.birdeye_api_key.clone(),
            config.http_timeout,
        )?));
    }
    chain.push(Arc::new(PumpFunClient::new()?));

    let enricher = MetricsEnricher::new(chain)
        .with_holder_source(rpc.clone(), config.holder_page_limit)
        .with_metadata_source(rpc.clone())
        .with_call_timeout(config.http_timeout);
    info!("📊 Enrichment chain: {}", enricher.provider_names().join(" -> "));

    let resolver = TransactionResolver::from_config(rpc, &config);

    // ============================================
    // Registry, publisher and consumers
    // ============================================
    let (publisher, feed) = change_channel();
    let registry = TokenRegistry::new(publisher);

    let mut bridge = ChangeBridge::new(feed, TokenCache::with_settings(refresh.clone()));
    bridge.add_consumer(AlertConsumer::new(thresholds.clone()).with_stats(stats.clone()));
    let bridge_task = tokio::spawn(bridge.run(shutdown.clone()));

    let scheduler = RefreshScheduler::new(
        registry.clone(),
        enricher.clone(),
        thresholds,
        SchedulerSettings::from_config(&config, refresh),
        stats.clone(),
        shutdown.clone(),
    );
    let scheduler_task = tokio::spawn(scheduler.run());

    let tracked = registry.clone();
    let printer = spawn_stats_printer(stats.clone(), STATS_EVERY, move || tracked.len());

    // Graceful shutdown on Ctrl+C
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Shutting down gracefully...");
            signal.trigger();
        }
    });

    // ============================================
    // Subscription loop with reconnection
    // ============================================
    let processor = EventProcessor::from_config(
        &config,
        resolver,
        enricher,
        registry.clone(),
        stats.clone(),
    );
    let mut listener = SubscriptionListener::new(
        ListenerSettings::from_config(&config),
        processor,
        stats.clone(),
        shutdown.clone(),
    );

    info!("🔌 Connecting to {}", mask_url(&config.wss_url));
    let mut reconnect_attempts = 0;
    let mut reconnect_delay = RECONNECT_BASE_MS;

    while !shutdown.is_triggered() {
        let connected = tokio::select! {
            _ = shutdown.wait() => break,
            result = listener.connect() => result,
        };

        match connected {
            Ok(()) => {
                reconnect_attempts = 0;
                reconnect_delay = RECONNECT_BASE_MS;
                info!(
                    "✅ Subscribed to program logs (subscription {})",
                    listener.subscription_id().unwrap_or_default()
                );
                match listener.listen().await {
                    Ok(()) => break,
                    Err(e) => warn!("⚠️ Session lost: {}", e),
                }
            }
            Err(e) => error!("❌ Connection failed: {}", e),
        }

        reconnect_attempts += 1;
        if reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
            error!("❌ Max reconnection attempts reached, giving up");
            break;
        }

        let wait = with_jitter(reconnect_delay);
        warn!(
            "🔄 Reconnecting in {}ms (attempt {}/{})",
            wait, reconnect_attempts, MAX_RECONNECT_ATTEMPTS
        );
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(Duration::from_millis(wait)) => {}
        }

        // Exponential backoff with cap
        reconnect_delay = (reconnect_delay * 2).min(RECONNECT_MAX_MS);
    }

    // ============================================
    // Teardown
    // ============================================
    listener.disconnect().await;
    shutdown.trigger();
    printer.abort();

    if let Err(e) = scheduler_task.await {
        warn!("⚠️ Scheduler task ended abnormally: {}", e);
    }
    if let Err(e) = bridge_task.await {
        warn!("⚠️ Bridge task ended abnormally: {}", e);
    }

    let snapshot = stats.snapshot();
    info!("📊 Final Statistics:");
    info!("{}", snapshot.summary(registry.len()));
    info!("\n{}", snapshot.to_json());

    Ok(())
}
