//! Change Publisher
//!
//! Unbounded multi-producer FIFO of change events. Producers never wait on
//! the consumer. The feed side is drained either in one non-blocking sweep or
//! one event at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

use crate::models::types::{ChangeAction, ChangeEvent, Token};
use crate::utils::constants::short;

/// Create a connected publisher/feed pair
pub fn change_channel() -> (ChangePublisher, ChangeFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    let published = Arc::new(AtomicU64::new(0));
    (
        ChangePublisher {
            tx,
            published: published.clone(),
        },
        ChangeFeed { rx, published },
    )
}

/// Producer handle, cheap to clone
#[derive(Clone, Debug)]
pub struct ChangePublisher {
    tx: mpsc::UnboundedSender<ChangeEvent>,
    published: Arc<AtomicU64>,
}

impl ChangePublisher {
    /// Queue an event. Returns false once the feed has been dropped.
    pub fn publish(&self, action: ChangeAction, token: Token) -> bool {
        trace!("📤 {} {}", action.as_str(), short(&token.address));
        let sent = self.tx.send(ChangeEvent::new(action, token)).is_ok();
        if sent {
            self.published.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the queue
#[derive(Debug)]
pub struct ChangeFeed {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    published: Arc<AtomicU64>,
}

impl ChangeFeed {
    /// Remove and return everything currently queued, in FIFO order
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event. `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Events published since the channel was created
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
