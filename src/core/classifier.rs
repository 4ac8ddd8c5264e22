//! Log Classifier
//!
//! Maps the log lines of one program invocation to the kind of event it
//! represents. Pure function, no I/O.

use serde::{Deserialize, Serialize};

use crate::models::types::TradeSide;
use crate::utils::constants::{BUY_MARKER, CREATE_MARKER, SELL_MARKER};

/// Category of a log notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Creation,
    Buy,
    Sell,
    Ignore,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Creation => "creation",
            EventKind::Buy => "buy",
            EventKind::Sell => "sell",
            EventKind::Ignore => "ignore",
        }
    }

    /// Trade side for Buy/Sell, `None` otherwise
    pub fn trade_side(&self) -> Option<TradeSide> {
        match self {
            EventKind::Buy => Some(TradeSide::Buy),
            EventKind::Sell => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// Classify a log bundle
///
/// Failed transactions are ignored outright. Otherwise every line is scanned
/// and the last marker seen decides the category.
pub fn classify<S: AsRef<str>>(logs: &[S], failed: bool) -> EventKind {
    if failed {
        return EventKind::Ignore;
    }

    let mut kind = EventKind::Ignore;
    for line in logs {
        let line = line.as_ref();
        if line.contains(CREATE_MARKER) {
            kind = EventKind::Creation;
        } else if line.contains(BUY_MARKER) {
            kind = EventKind::Buy;
        } else if line.contains(SELL_MARKER) {
            kind = EventKind::Sell;
        }
    }
    kind
}
