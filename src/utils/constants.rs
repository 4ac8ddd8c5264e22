//! Constants Module - Single Source of Truth
//!
//! Program identifiers, log markers, endpoints and the default timings the
//! pipeline runs with. Anything tunable at runtime lives in `models::config`
//! and only takes its default from here.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "pumpscope";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = concat!("pumpscope/", env!("CARGO_PKG_VERSION"));

// ============================================
// CHAIN CONSTANTS
// ============================================

/// pump.fun bonding-curve program
pub const PUMP_FUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Wrapped SOL mint. Appears in token balances of nearly every trade and is
/// never the launched asset.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Commitment used for both the subscription and transaction lookups
pub const COMMITMENT: &str = "confirmed";

/// Parsed instruction types that declare a new mint
pub const INITIALIZE_MINT_TYPES: [&str; 2] = ["initializeMint", "initializeMint2"];

// ============================================
// LOG MARKERS
// ============================================

pub const CREATE_MARKER: &str = "Instruction: Create";
pub const BUY_MARKER: &str = "Instruction: Buy";
pub const SELL_MARKER: &str = "Instruction: Sell";

// ============================================
// VALUATION
// ============================================

/// Market cap (USD) at which the bonding curve completes
pub const GRADUATION_MARKET_CAP_USD: f64 = 69_000.0;

/// 1h volume / 12 approximates a 5 minute window
pub const FIVE_MIN_PER_HOUR: f64 = 12.0;

/// 24h volume / 288 approximates a 5 minute window
pub const FIVE_MIN_PER_DAY: f64 = 288.0;

// ============================================
// ENDPOINTS
// ============================================

pub const HELIUS_WSS_BASE: &str = "wss://mainnet.helius-rpc.com/?api-key=";
pub const HELIUS_RPC_BASE: &str = "https://mainnet.helius-rpc.com/?api-key=";
pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com/latest/dex";
pub const BIRDEYE_BASE_URL: &str = "https://public-api.birdeye.so/defi";
pub const PUMP_FUN_API_BASE_URL: &str = "https://frontend-api.pump.fun";

// ============================================
// DEFAULT TIMINGS
// ============================================

/// Wait before resolving a fresh creation (indexer lag)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// getTransaction attempts before giving up
pub const DEFAULT_RESOLVE_ATTEMPTS: u32 = 3;

/// Delay between getTransaction attempts
pub const DEFAULT_RESOLVE_RETRY_MS: u64 = 3_000;

/// Silence on the socket before a ping is sent
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Time allowed for the ping to be answered
pub const DEFAULT_PING_TIMEOUT_SECS: u64 = 10;

/// Time allowed for the subscription acknowledgment
pub const DEFAULT_ACK_TIMEOUT_SECS: u64 = 10;

/// Timeout for enrichment and RPC HTTP calls
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// The platform-native endpoint is slower to fail; keep it short
pub const PUMP_FUN_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 8;
pub const DEFAULT_REFRESH_BATCH_SIZE: usize = 10;
pub const DEFAULT_REFRESH_PACING_MS: u64 = 500;

/// Entities older than this are evicted
pub const DEFAULT_RETENTION_SECS: u64 = 30 * 60;

/// Result-size cap for holder enumeration
pub const DEFAULT_HOLDER_PAGE_LIMIT: u32 = 1_000;

pub const DEFAULT_MAX_CONCURRENT_EVENTS: usize = 32;

/// Seen-signature set is cleared past this size
pub const SEEN_SIGNATURES_CAP: usize = 10_000;

/// Evicted-address tombstones are cleared past this size
pub const EVICTED_TOMBSTONES_CAP: usize = 50_000;

// ============================================
// HELPERS
// ============================================

pub fn helius_wss_url(api_key: &str) -> String {
    format!("{}{}", HELIUS_WSS_BASE, api_key)
}

pub fn helius_rpc_url(api_key: &str) -> String {
    format!("{}{}", HELIUS_RPC_BASE, api_key)
}

/// Strip the `api-key` query value before an endpoint is logged
pub fn mask_url(url: &str) -> String {
    match url.find("api-key=") {
        Some(idx) => format!("{}api-key=***", &url[..idx]),
        None => url.to_string(),
    }
}

/// First characters of an address or signature, for log lines
pub fn short(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(id.len());
    &id[..end]
}
