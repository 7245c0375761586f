//! Message types for the price stream protocol.
//!
//! Frames are JSON objects discriminated by a `type` field, one message per
//! frame.

use serde::{Deserialize, Serialize};

use crate::shared::{Symbol, Trade};

// ============================================================================
// REQUEST TYPES (Client → Server)
// ============================================================================

/// Client → gateway message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { symbols: Vec<Symbol> },
    Unsubscribe { symbols: Vec<Symbol> },
    Ping,
}

impl ClientMessage {
    pub fn subscribe(symbols: Vec<Symbol>) -> Self {
        Self::Subscribe { symbols }
    }

    pub fn unsubscribe(symbols: Vec<Symbol>) -> Self {
        Self::Unsubscribe { symbols }
    }

    pub fn ping() -> Self {
        Self::Ping
    }
}

// ============================================================================
// RESPONSE TYPES (Server → Client)
// ============================================================================

/// Raw inbound frame: the `type` tag plus the remaining fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWsMessage {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl RawWsMessage {
    /// Decode the payload fields into a typed body.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.payload.clone()))
    }
}

/// Body of `subscribed` / `unsubscribed` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolsData {
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

/// Body of `error` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Error codes the gateway sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// Upstream data source is switched off; retrying cannot succeed
    RedisDisabled,
    InvalidJson,
    InvalidSymbols,
    Other(String),
}

impl ErrorCode {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RedisDisabled)
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        match s {
            "REDIS_DISABLED" => Self::RedisDisabled,
            "INVALID_JSON" => Self::InvalidJson,
            "INVALID_SYMBOLS" => Self::InvalidSymbols,
            other => Self::Other(other.to_string()),
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Events emitted by the streaming client.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Connection opened
    Connected,

    /// Connection closed
    Disconnected { reason: String },

    /// Reconnect scheduled after `delay_ms`
    Reconnecting { attempt: u32, delay_ms: u64 },

    /// Trade applied to the price store
    Price { symbol: Symbol, trade: Trade },

    /// Gateway confirmed subscriptions
    Subscribed { symbols: Vec<Symbol> },

    /// Gateway confirmed unsubscriptions
    Unsubscribed { symbols: Vec<Symbol> },

    /// Error occurred
    Error {
        error: super::error::WebSocketError,
    },

    /// Pong received
    Pong,

    /// Reconnect budget exhausted; state is `Error` until `connect()`
    MaxReconnectReached,
}

// ============================================================================
// MESSAGE TYPE ENUM
// ============================================================================

/// Enum for all possible server message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Price,
    Subscribed,
    Unsubscribed,
    Error,
    Pong,
    Unknown,
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "price" => Self::Price,
            "subscribed" => Self::Subscribed,
            "unsubscribed" => Self::Unsubscribed,
            "error" => Self::Error,
            "pong" => Self::Pong,
            _ => Self::Unknown,
        }
    }
}
