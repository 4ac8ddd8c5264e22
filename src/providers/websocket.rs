//! Log Subscription WebSocket Module
//!
//! One `logsSubscribe` session against a Solana-compatible websocket endpoint.
//!
//! Wire format:
//! - request:  `{"method":"logsSubscribe","params":[{"mentions":[PROGRAM]},{"commitment":"confirmed"}]}`
//! - ack:      `{"result":<subscription id>,"id":<request id>}`
//! - payload:  `{"method":"logsNotification","params":{"result":{"value":{signature,err,logs}}}}`
//!
//! A [`LogsSession`] is single use. Reconnecting means opening a new one.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::{mask_url, COMMITMENT};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Request id of the subscribe call
const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// Request id of the unsubscribe call
const UNSUBSCRIBE_REQUEST_ID: u64 = 2;

// ============================================
// FRAME TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct LogsNotificationFrame {
    params: LogsParams,
}

#[derive(Debug, Deserialize)]
struct LogsParams {
    result: LogsResult,
}

#[derive(Debug, Deserialize)]
struct LogsResult {
    value: LogsValue,
}

#[derive(Debug, Deserialize)]
struct LogsValue {
    signature: String,
    #[serde(default)]
    logs: Option<Vec<String>>,
    #[serde(default)]
    err: Option<serde_json::Value>,
}

/// Decoded log notification
#[derive(Debug, Clone, PartialEq)]
pub struct LogNotification {
    pub signature: String,
    pub logs: Vec<String>,
    /// Transaction carried an error
    pub failed: bool,
}

impl LogNotification {
    pub fn new(signature: impl Into<String>, logs: Vec<String>, failed: bool) -> Self {
        Self {
            signature: signature.into(),
            logs,
            failed,
        }
    }
}

/// Classified inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Log(LogNotification),
    /// Response to a request carrying a numeric subscription id
    SubscriptionAck { request_id: u64, subscription: u64 },
    /// JSON-RPC error response
    RpcError { request_id: Option<u64>, message: String },
    /// Anything else (unsubscribe confirmations, unknown methods, garbage)
    Other,
}

/// Decode one text frame
pub fn parse_frame(text: &str) -> Frame {
    let json: serde_json::Value = match serde_json::from_str(text) {
        Ok(json) => json,
        Err(_) => return Frame::Other,
    };

    if json.get("method").and_then(|m| m.as_str()) == Some("logsNotification") {
        return match serde_json::from_value::<LogsNotificationFrame>(json) {
            Ok(frame) => {
                let value = frame.params.result.value;
                Frame::Log(LogNotification {
                    signature: value.signature,
                    logs: value.logs.unwrap_or_default(),
                    failed: value.err.is_some_and(|e| !e.is_null()),
                })
            }
            Err(e) => {
                debug!("⚠️ Malformed logsNotification: {}", e);
                Frame::Other
            }
        };
    }

    let request_id = json.get("id").and_then(|id| id.as_u64());

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return Frame::RpcError { request_id, message };
    }

    match (request_id, json.get("result").and_then(|r| r.as_u64())) {
        (Some(request_id), Some(subscription)) => Frame::SubscriptionAck {
            request_id,
            subscription,
        },
        _ => Frame::Other,
    }
}

pub fn subscribe_request(program_id: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": SUBSCRIBE_REQUEST_ID,
        "method": "logsSubscribe",
        "params": [
            {"mentions": [program_id]},
            {"commitment": COMMITMENT}
        ]
    })
    .to_string()
}

pub fn unsubscribe_request(subscription: u64) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": UNSUBSCRIBE_REQUEST_ID,
        "method": "logsUnsubscribe",
        "params": [subscription]
    })
    .to_string()
}

// ============================================
// SESSION
// ============================================

/// An acknowledged log subscription
pub struct LogsSession {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    subscription: u64,
}

impl LogsSession {
    /// Connect, subscribe and wait for the acknowledgment
    ///
    /// Fails with a transport error if the socket cannot be opened, the
    /// request is rejected, or no ack arrives within `ack_timeout`.
    pub async fn open(url: &str, program_id: &str, ack_timeout: Duration) -> AppResult<Self> {
        info!("🔌 Connecting to {}", mask_url(url));
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| AppError::ws_connect_failed(format!("{}: {}", mask_url(url), e)))?;

        let (mut write, mut read) = ws_stream.split();
        write.send(Message::Text(subscribe_request(program_id))).await?;

        let subscription = tokio::time::timeout(ack_timeout, Self::await_ack(&mut read))
            .await
            .map_err(|_| {
                AppError::subscribe_rejected(format!(
                    "No subscription ack within {}s",
                    ack_timeout.as_secs()
                ))
            })??;

        info!("📌 Subscribed to program logs (subscription {})", subscription);
        Ok(Self {
            write,
            read,
            subscription,
        })
    }

    /// Pings seen here are answered by tungstenite on the next read
    async fn await_ack(read: &mut SplitStream<WsStream>) -> AppResult<u64> {
        while let Some(message) = read.next().await {
            match message? {
                Message::Text(text) => match parse_frame(&text) {
                    Frame::SubscriptionAck {
                        request_id: SUBSCRIBE_REQUEST_ID,
                        subscription,
                    } => return Ok(subscription),
                    Frame::RpcError { message, .. } => {
                        return Err(AppError::subscribe_rejected(message));
                    }
                    _ => {}
                },
                Message::Close(_) => {
                    return Err(AppError::subscribe_rejected("Closed before acknowledgment"))
                }
                _ => {}
            }
        }
        Err(AppError::subscribe_rejected("Stream ended before acknowledgment"))
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription
    }

    /// Next raw message, `None` when the stream has ended
    pub async fn next_message(&mut self) -> Option<AppResult<Message>> {
        self.read
            .next()
            .await
            .map(|result| result.map_err(AppError::from))
    }

    pub async fn send(&mut self, message: Message) -> AppResult<()> {
        self.write.send(message).await?;
        Ok(())
    }

    pub async fn ping(&mut self) -> AppResult<()> {
        self.send(Message::Ping(b"pumpscope".to_vec())).await
    }

    /// Best-effort unsubscribe followed by a close frame
    pub async fn close(mut self) {
        if let Err(e) = self
            .write
            .send(Message::Text(unsubscribe_request(self.subscription)))
            .await
        {
            debug!("⚠️ Unsubscribe not sent: {}", e);
        }
        if let Err(e) = self.write.send(Message::Close(None)).await {
            debug!("⚠️ Close frame not sent: {}", e);
        }
        if let Err(e) = self.write.close().await {
            warn!("⚠️ Socket close failed: {}", e);
        }
        info!("🔌 Subscription {} closed", self.subscription);
    }
}
