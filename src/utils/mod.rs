//! Utils Module - Helper Functions & Shared Utilities
//!
//! Constants, endpoint helpers and the consumer-side token cache.

pub mod cache;
pub mod constants;

pub use cache::*;
pub use constants::*;
