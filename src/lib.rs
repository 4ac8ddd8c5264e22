//! Pumpscope Library
//!
//! Real-time pump.fun launch monitor:
//! - Log subscription on the bonding-curve program
//! - Transaction resolution to the launched mint
//! - Multi-source metric enrichment with fallback
//! - A live token registry, refreshed and aged out in the background,
//!   republished as an ordered stream of change events

pub mod core;
pub mod models;
pub mod providers;
pub mod telemetry;
pub mod utils;

pub use crate::core::{
    AlertConsumer, ChangeBridge, EventProcessor, MetricsEnricher, RefreshScheduler, Shutdown,
    SubscriptionListener, TokenRegistry, TransactionResolver,
};
pub use models::{
    AppError, AppResult, ChangeAction, ChangeEvent, MonitorConfig, RefreshSettings, SharedRefresh,
    SharedThresholds, Thresholds, Token,
};
pub use telemetry::{PipelineStats, StatsSnapshot};
pub use utils::TokenCache;
