//! Subscription Listener
//!
//! Owns one log subscription at a time and feeds every notification to the
//! [`EventProcessor`]. Exposes `connect` / `listen` / `disconnect` as separate
//! steps; reconnect policy belongs to the caller.
//!
//! State machine: `Disconnected -> Connecting -> Subscribed -> Listening -> Disconnected`

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::core::processor::EventProcessor;
use crate::models::config::MonitorConfig;
use crate::models::errors::{AppError, AppResult};
use crate::providers::websocket::{parse_frame, Frame, LogNotification, LogsSession};
use crate::telemetry::PipelineStats;

// ============================================
// SHUTDOWN SIGNAL
// ============================================

/// Cloneable stop flag observed by every long-running loop
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `trigger` has been called
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

// ============================================
// LISTENER
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribed,
    Listening,
}

/// Connection settings for the listener
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub url: String,
    pub program_id: String,
    pub ack_timeout: Duration,
    pub idle_timeout: Duration,
    pub ping_timeout: Duration,
    pub max_concurrent_events: usize,
}

impl ListenerSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            url: config.wss_url.clone(),
            program_id: config.program_id.clone(),
            ack_timeout: config.ack_timeout,
            idle_timeout: config.idle_timeout,
            ping_timeout: config.ping_timeout,
            max_concurrent_events: config.max_concurrent_events,
        }
    }
}

pub struct SubscriptionListener {
    settings: ListenerSettings,
    processor: EventProcessor,
    semaphore: Arc<Semaphore>,
    stats: Arc<PipelineStats>,
    shutdown: Shutdown,
    session: Option<LogsSession>,
    state: SessionState,
}

impl SubscriptionListener {
    pub fn new(
        settings: ListenerSettings,
        processor: EventProcessor,
        stats: Arc<PipelineStats>,
        shutdown: Shutdown,
    ) -> Self {
        let permits = settings.max_concurrent_events.max(1);
        Self {
            settings,
            processor,
            semaphore: Arc::new(Semaphore::new(permits)),
            stats,
            shutdown,
            session: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn subscription_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.subscription_id())
    }

    /// Open the socket and subscribe. A missing ack is fatal for this session.
    pub async fn connect(&mut self) -> AppResult<()> {
        if self.session.is_some() {
            self.disconnect().await;
        }

        self.state = SessionState::Connecting;
        match LogsSession::open(
            &self.settings.url,
            &self.settings.program_id,
            self.settings.ack_timeout,
        )
        .await
        {
            Ok(session) => {
                self.session = Some(session);
                self.state = SessionState::Subscribed;
                self.stats.record_session();
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Consume frames until stopped or the session fails
    ///
    /// Returns `Ok(())` on shutdown and a transport error when the session is
    /// lost. Either way the session is closed on return.
    pub async fn listen(&mut self) -> AppResult<()> {
        let Some(mut session) = self.session.take() else {
            return Err(AppError::ws_closed("listen called without a subscribed session"));
        };
        self.state = SessionState::Listening;
        info!("👂 Listening for program logs...");

        let result = self.pump(&mut session).await;

        session.close().await;
        self.state = SessionState::Disconnected;
        if let Err(e) = &result {
            warn!("🔌 Session ended: {}", e);
        }
        result
    }

    async fn pump(&self, session: &mut LogsSession) -> AppResult<()> {
        let mut ping_deadline: Option<Instant> = None;

        loop {
            let wait = match ping_deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => self.settings.idle_timeout,
            };

            let next = tokio::select! {
                _ = self.shutdown.wait() => {
                    info!("🛑 Shutdown requested, leaving listen loop");
                    return Ok(());
                }
                next = tokio::time::timeout(wait, session.next_message()) => next,
            };

            let message = match next {
                Err(_) if ping_deadline.is_some() => return Err(AppError::ping_timeout()),
                Err(_) => {
                    debug!("🏓 No frame for {}s, probing", self.settings.idle_timeout.as_secs());
                    session.ping().await?;
                    ping_deadline = Some(Instant::now() + self.settings.ping_timeout);
                    continue;
                }
                Ok(None) => return Err(AppError::ws_closed("Stream ended")),
                Ok(Some(message)) => message?,
            };

            // any inbound frame proves the connection is alive
            ping_deadline = None;

            match message {
                Message::Text(text) => match parse_frame(&text) {
                    Frame::Log(notification) => self.dispatch(notification),
                    Frame::RpcError { message, .. } => warn!("⚠️ Endpoint error: {}", message),
                    _ => {}
                },
                Message::Pong(_) => debug!("🏓 Pong"),
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "no reason".to_string());
                    return Err(AppError::ws_closed(format!("Closed by server: {}", reason)));
                }
                _ => {}
            }
        }
    }

    /// Hand a notification to a task, bounded by the semaphore
    fn dispatch(&self, notification: LogNotification) {
        let processor = self.processor.clone();
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            processor.handle(notification).await;
        });
    }

    /// Close the current session if any
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.state = SessionState::Disconnected;
    }
}
