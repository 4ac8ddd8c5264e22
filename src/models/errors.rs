//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so a log line can be traced back
//! to the stage that produced it.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - WS_xxx: subscription transport errors
//! - RPC_xxx / TX_xxx: chain-data endpoint errors
//! - SOURCE_xxx: enrichment source errors
//! - CFG_xxx: configuration errors
//!
//! Codes are grouped into four [`ErrorKind`]s. Only `Transport` is fatal, and
//! only to the current subscription session.

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Session-ending failure that must reach the reconnect owner
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection/protocol failure. Ends the current session.
    Transport,
    /// Resolution or extraction yielded nothing. The event is dropped.
    NotFound,
    /// A source returned malformed or empty data. Fall through to the next one.
    PartialData,
    /// Throttled or slow source. Handled like `PartialData` for that source only.
    RateLimitOrTimeout,
    /// Bad or missing settings, reported at startup.
    Config,
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Subscription transport (1xx)
    // ============================================
    /// Could not open the websocket
    WsConnectFailed,
    /// Subscription request was rejected or never acknowledged
    WsSubscribeRejected,
    /// Server closed the stream
    WsClosed,
    /// Liveness probe went unanswered
    WsPingTimeout,
    /// Frame-level protocol error
    WsProtocol,

    // ============================================
    // Chain-data endpoint (2xx)
    // ============================================
    /// Endpoint answered with an explicit JSON-RPC error
    RpcError,
    /// Response did not match the expected shape
    RpcInvalidResponse,
    /// Transaction still unknown after every attempt
    TransactionNotFound,
    /// No mint could be extracted from a transaction
    MintNotFound,

    // ============================================
    // HTTP / enrichment sources (3xx)
    // ============================================
    /// HTTP connection failed
    HttpConnectFailed,
    /// Source returned a non-success status
    SourceHttpStatus,
    /// Source returned no usable data (zero valuation, empty pairs)
    SourceNoData,
    /// Source throttled us (HTTP 429)
    SourceRateLimited,
    /// Source not configured (missing credentials)
    SourceDisabled,
    /// External call timed out
    ExternalTimeout,

    // ============================================
    // Configuration (4xx)
    // ============================================
    /// Missing API key
    ConfigMissingApiKey,
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Generic (9xx)
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WsConnectFailed => "WS_CONNECT_FAILED",
            Self::WsSubscribeRejected => "WS_SUBSCRIBE_REJECTED",
            Self::WsClosed => "WS_CLOSED",
            Self::WsPingTimeout => "WS_PING_TIMEOUT",
            Self::WsProtocol => "WS_PROTOCOL",

            Self::RpcError => "RPC_ERROR",
            Self::RpcInvalidResponse => "RPC_INVALID_RESPONSE",
            Self::TransactionNotFound => "TX_NOT_FOUND",
            Self::MintNotFound => "TX_MINT_NOT_FOUND",

            Self::HttpConnectFailed => "HTTP_CONNECT_FAILED",
            Self::SourceHttpStatus => "SOURCE_HTTP_STATUS",
            Self::SourceNoData => "SOURCE_NO_DATA",
            Self::SourceRateLimited => "SOURCE_RATE_LIMITED",
            Self::SourceDisabled => "SOURCE_DISABLED",
            Self::ExternalTimeout => "EXTERNAL_TIMEOUT",

            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WsConnectFailed
            | Self::WsSubscribeRejected
            | Self::WsClosed
            | Self::WsPingTimeout
            | Self::WsProtocol => ErrorKind::Transport,

            Self::TransactionNotFound | Self::MintNotFound => ErrorKind::NotFound,

            Self::SourceRateLimited | Self::ExternalTimeout => ErrorKind::RateLimitOrTimeout,

            Self::ConfigMissingApiKey | Self::ConfigInvalidValue => ErrorKind::Config,

            Self::RpcError
            | Self::RpcInvalidResponse
            | Self::HttpConnectFailed
            | Self::SourceHttpStatus
            | Self::SourceNoData
            | Self::SourceDisabled
            | Self::Unknown => ErrorKind::PartialData,
        }
    }

    /// An explicit answer from the endpoint; asking again will not change it
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::RpcError)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn ws_connect_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WsConnectFailed, msg)
    }

    pub fn subscribe_rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WsSubscribeRejected, msg)
    }

    pub fn ws_closed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WsClosed, msg)
    }

    pub fn ping_timeout() -> Self {
        Self::new(ErrorCode::WsPingTimeout, "Liveness probe unanswered")
    }

    pub fn rpc_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcError, msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcInvalidResponse, msg)
    }

    pub fn transaction_not_found(signature: &str) -> Self {
        Self::new(
            ErrorCode::TransactionNotFound,
            format!("Transaction {} not available", signature),
        )
    }

    pub fn mint_not_found(signature: &str) -> Self {
        Self::new(
            ErrorCode::MintNotFound,
            format!("No mint found in transaction {}", signature),
        )
    }

    pub fn source_status(source: &str, status: u16) -> Self {
        if status == 429 {
            Self::new(ErrorCode::SourceRateLimited, format!("{} rate limited (HTTP 429)", source))
        } else {
            Self::new(ErrorCode::SourceHttpStatus, format!("{} returned HTTP {}", source, status))
        }
    }

    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceNoData, msg)
    }

    pub fn source_disabled(source: &str) -> Self {
        Self::new(ErrorCode::SourceDisabled, format!("{} not configured", source))
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalTimeout, msg)
    }

    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ExternalTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::HttpConnectFailed, "Connection failed")
        } else if let Some(status) = err.status() {
            Self::source_status("http", status.as_u16())
        } else if err.is_decode() {
            Self::with_source(ErrorCode::RpcInvalidResponse, "Undecodable response body", err)
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::RpcInvalidResponse, "JSON parse error", err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::new(ErrorCode::WsClosed, "WebSocket connection closed")
            }
            other => Self::with_source(ErrorCode::WsProtocol, "WebSocket error", other),
        }
    }
}
