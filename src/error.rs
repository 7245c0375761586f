//! Unified SDK error types.

use thiserror::Error;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[cfg(feature = "api")]
    #[error("API error: {0}")]
    Api(#[from] crate::api::ApiError),

    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] crate::websocket::WebSocketError),

    /// Bad value in the session configuration or environment
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
