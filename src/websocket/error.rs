//! Streaming error types for the Quantboard SDK.

use thiserror::Error;

use crate::websocket::types::ErrorCode;

/// Streaming errors.
///
/// None of these escape `connect`/`subscribe`; they are delivered as
/// [`WsEvent::Error`](crate::websocket::WsEvent::Error) and reflected in the
/// connection state.
#[derive(Debug, Clone, Error)]
pub enum WebSocketError {
    /// Connection attempt failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Unexpected connection close
    #[error("Connection closed unexpectedly: code {code}, reason: {reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// JSON deserialization failure
    #[error("Failed to parse message: {0}")]
    MessageParseError(String),

    /// Error frame sent by the gateway
    #[error("Server error: {message} (code: {code})")]
    ServerError { code: String, message: String },

    /// No pong within the configured window
    #[error("Ping timeout: no pong response received")]
    PingTimeout,

    /// WebSocket protocol error
    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    /// Not connected
    #[error("Not connected to price stream")]
    NotConnected,

    /// Channel closed
    #[error("Internal channel closed")]
    ChannelClosed,

    /// Invalid URL
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Reconnect budget exhausted
    #[error("Gave up after {0} reconnect attempts")]
    MaxReconnectAttempts(u32),
}

impl WebSocketError {
    /// Whether the gateway signalled a condition that must not be retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ServerError { code, .. } => ErrorCode::from(code.as_str()).is_fatal(),
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WebSocketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed => WebSocketError::ConnectionClosed {
                code: 1000,
                reason: "Connection closed normally".to_string(),
            },
            Error::AlreadyClosed => WebSocketError::NotConnected,
            Error::Io(e) => WebSocketError::Io(e.to_string()),
            Error::Protocol(e) => WebSocketError::Protocol(e.to_string()),
            Error::Url(e) => WebSocketError::InvalidUrl(e.to_string()),
            Error::Http(resp) => {
                WebSocketError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => WebSocketError::ConnectionFailed(e.to_string()),
            other => WebSocketError::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WebSocketError {
    fn from(err: serde_json::Error) -> Self {
        WebSocketError::MessageParseError(err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for WebSocketError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        WebSocketError::ChannelClosed
    }
}

/// Result type alias for streaming operations
pub type WsResult<T> = Result<T, WebSocketError>;
