//! REST API client module for Quantboard.
//!
//! Historical candles seed the chart; symbol metadata backs pickers and
//! labels. Live data comes from the [`websocket`](crate::websocket) module.
//!
//! # Error Handling
//!
//! All methods return `ApiResult<T>` which is an alias for `Result<T, ApiError>`:
//!
//! ```rust,ignore
//! use quantboard::api::{ApiError, CandlesParams, QuantboardApiClient};
//!
//! match client.get_candles(params).await {
//!     Ok(resp) => println!("{} candles", resp.candles.len()),
//!     Err(ApiError::BadRequest(msg)) => println!("Rejected: {}", msg),
//!     Err(ApiError::ServerError(msg)) => println!("Upstream unavailable: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{QuantboardApiClient, QuantboardApiClientBuilder, RetryConfig, MAX_CANDLES_LIMIT};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use types::{CandlesParams, CandlesResponse, SupportedSymbolsResponse};
