//! Core Module - Ingestion Pipeline
//!
//! Classify, resolve, enrich, track and publish. Network access goes through
//! the capability traits declared here and implemented in `providers`.

pub mod bridge;
pub mod classifier;
pub mod enricher;
pub mod listener;
pub mod processor;
pub mod publisher;
pub mod registry;
pub mod resolver;
pub mod scheduler;

pub use bridge::{AlertConsumer, AlertLog, ChangeBridge, ChangeConsumer};
pub use classifier::{classify, EventKind};
pub use enricher::{HolderSource, MetadataSource, MetricsEnricher, MetricsProvider};
pub use listener::{ListenerSettings, SessionState, Shutdown, SubscriptionListener};
pub use processor::{EventProcessor, Outcome};
pub use publisher::{change_channel, ChangeFeed, ChangePublisher};
pub use registry::{TokenRegistry, Upsert};
pub use resolver::{TransactionDetail, TransactionResolver, TransactionSource};
pub use scheduler::{CycleReport, RefreshScheduler, SchedulerSettings};
