//! Streaming client for the gateway's live price feed.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quantboard::prelude::*;
//! use futures_util::StreamExt;
//!
//! let registry = SymbolRegistry::default();
//! let store = PriceStore::new(&registry).shared();
//! let mut client = MarketStreamClient::new(
//!     "http://localhost:8000",
//!     &registry,
//!     store.clone(),
//!     WebSocketConfig::default(),
//! );
//!
//! client.connect().await;
//! client.subscribe(["SOLUSDT"]).await;
//!
//! while let Some(event) = client.next().await {
//!     match event {
//!         WsEvent::Price { symbol, trade } => println!("{} @ {}", symbol, trade.price),
//!         WsEvent::Reconnecting { attempt, delay_ms } => {
//!             println!("reconnect #{} in {}ms", attempt, delay_ms)
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod handlers;
pub mod reconnect;
pub mod subscriptions;
pub mod types;

pub use client::{MarketStreamClient, WebSocketConfig};
pub use error::{WebSocketError, WsResult};
pub use handlers::MessageHandler;
pub use reconnect::{Backoff, ReconnectPolicy};
pub use subscriptions::{PendingFlush, SubscriptionManager};
pub use types::{ClientMessage, ErrorCode, WsEvent};

pub use crate::shared::ConnectionState;
