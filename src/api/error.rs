//! API error types for the Quantboard REST client.

use reqwest::StatusCode;
use thiserror::Error;

/// API-specific error type for the Quantboard REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP/network error from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request parameters (400, 422)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Permission denied (403)
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Too many requests (429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Server-side error (5xx), including an unreachable upstream exchange
    #[error("Server error: {0}")]
    ServerError(String),

    /// JSON deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(String),

    /// Invalid parameter provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unexpected HTTP status code
    #[error("Unexpected status {0}: {1}")]
    UnexpectedStatus(u16, String),
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Classify a non-success response by status, taking the message from
    /// the gateway's error body when it parses.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|resp| resp.get_message())
            .unwrap_or_else(|_| body.trim().to_string());
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::BadRequest(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(message),
            s if s.is_server_error() => Self::ServerError(message),
            s => Self::UnexpectedStatus(s.as_u16(), message),
        }
    }

    /// Whether sending the same request again may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ServerError(_) | Self::RateLimited(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Error body returned by the gateway.
///
/// The gateway reports failures as `{"detail": ...}`, where `detail` is a
/// string for handled errors and an array of field errors for rejected
/// query parameters.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Get the error message, preferring `detail` over `message`.
    pub fn get_message(&self) -> String {
        match &self.detail {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(serde_json::Value::Array(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| {
                        item.get("msg")
                            .and_then(|m| m.as_str())
                            .map(str::to_string)
                            .unwrap_or_else(|| item.to_string())
                    })
                    .collect();
                if !parts.is_empty() {
                    return parts.join("; ");
                }
            }
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
        self.message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}
