//! # Quantboard Rust SDK
//!
//! Client core for the Quantboard market-data gateway: live multi-symbol
//! trade streaming, per-symbol price state and candle charts.
//!
//! ## Modules
//!
//! - [`registry`]: supported symbols, defaults and bounds
//! - [`websocket`]: streaming connection manager with reconnect and
//!   subscription bookkeeping
//! - [`state`]: the price store fed by the stream, with change listeners
//! - [`chart`]: candle aggregation, moving averages and chart sync
//! - [`api`]: REST client for historical candles and symbol metadata
//! - [`session`]: owned context tying the above together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use quantboard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = MarketSession::new(SessionConfig::from_env()?)?;
//!     session.start().await;
//!     session.stream().subscribe(["SOLUSDT"]).await;
//!
//!     let mut chart = session.open_chart(RecordingSurface::new(), "BTCUSDT").await;
//!     let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));
//!     loop {
//!         tokio::select! {
//!             // Poll the stream, or set `WebSocketConfig::emit_events` to false
//!             event = session.stream_mut().next() => match event {
//!                 Some(WsEvent::Price { symbol, trade }) => println!("{} {}", symbol, trade.price),
//!                 Some(_) => {}
//!                 None => break,
//!             },
//!             _ = tick.tick() => {
//!                 chart.drain();
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Shared types used across all modules.
pub mod shared;

/// Network defaults and stream URL derivation.
pub mod network;

/// Symbol registry: supported pairs, default subscriptions and bounds.
pub mod registry;

/// Price state store.
pub mod state;

/// Candle aggregation and chart rendering.
pub mod chart;

/// Unified error type.
pub mod error;

/// REST API client for candles and symbol metadata.
#[cfg(feature = "api")]
pub mod api;

/// Streaming client for live prices.
#[cfg(feature = "websocket")]
pub mod websocket;

/// Session context owning registry, store and clients.
#[cfg(feature = "websocket")]
pub mod session;

// ============================================================================
// PRELUDE
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use quantboard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::chart::{
        CandleAggregator, CandleSource, CandleUpdate, CandlesParams, ChartConfig, ChartRenderer,
        ChartSurface, HistoryState, MovingAverage, OhlcvBar, RecordingSurface, SeriesId,
        SeriesPoint,
    };
    pub use crate::error::{SdkError, SdkResult};
    pub use crate::network::DEFAULT_API_URL;
    pub use crate::registry::{SymbolInfo, SymbolRegistry};
    pub use crate::shared::{ConnectionState, Interval, Symbol, Trade};
    pub use crate::state::{PriceStore, SharedPriceStore, StoreEvent, SymbolPriceData};

    #[cfg(feature = "api")]
    pub use crate::api::{
        ApiError, ApiResult, CandlesResponse, QuantboardApiClient, QuantboardApiClientBuilder,
        RetryConfig, SupportedSymbolsResponse,
    };

    #[cfg(feature = "websocket")]
    pub use crate::websocket::{MarketStreamClient, WebSocketConfig, WebSocketError, WsEvent};

    #[cfg(feature = "websocket")]
    pub use crate::session::{MarketSession, SessionConfig};
}
