//! Providers Module - External Data Sources
//!
//! Log subscription transport, the Solana JSON-RPC/DAS client and the three
//! valuation sources, in the order the enricher tries them.

pub mod birdeye;
pub mod dexscreener;
pub mod pumpfun;
pub mod rpc;
pub mod websocket;

pub use birdeye::BirdeyeClient;
pub use dexscreener::{metrics_from_pair, DexPair, DexScreenerClient};
pub use pumpfun::PumpFunClient;
pub use rpc::SolanaRpcClient;
pub use websocket::{LogNotification, LogsSession};
