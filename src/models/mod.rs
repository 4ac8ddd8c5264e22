//! Models Module - Data Structures & Configuration
//!
//! Tokens, enrichment metrics, change events, settings and the error type.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
