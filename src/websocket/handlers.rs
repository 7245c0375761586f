//! Message handlers for the price stream.
//!
//! Routes incoming frames into the price store and subscription bookkeeping
//! and returns the events to surface. A frame that fails to parse yields an
//! error event and touches no state.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::shared::Trade;
use crate::state::SharedPriceStore;
use crate::websocket::error::WebSocketError;
use crate::websocket::subscriptions::SubscriptionManager;
use crate::websocket::types::{ErrorData, MessageType, RawWsMessage, SymbolsData, WsEvent};

/// Handles incoming WebSocket messages
#[derive(Debug)]
pub struct MessageHandler {
    store: SharedPriceStore,
    subscriptions: Arc<RwLock<SubscriptionManager>>,
}

impl MessageHandler {
    pub fn new(store: SharedPriceStore, subscriptions: Arc<RwLock<SubscriptionManager>>) -> Self {
        Self {
            store,
            subscriptions,
        }
    }

    /// Handle an incoming message and return events
    pub async fn handle_message(&self, text: &str) -> Vec<WsEvent> {
        let raw_msg: RawWsMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Failed to parse WebSocket message: {}", e);
                return vec![parse_error(e)];
            }
        };

        match MessageType::from(raw_msg.type_.as_str()) {
            MessageType::Price => self.handle_price(&raw_msg).await,
            MessageType::Subscribed => self.handle_subscribed(&raw_msg).await,
            MessageType::Unsubscribed => self.handle_unsubscribed(&raw_msg).await,
            MessageType::Error => self.handle_error(&raw_msg),
            MessageType::Pong => vec![WsEvent::Pong],
            MessageType::Unknown => {
                tracing::debug!("Ignoring message type: {}", raw_msg.type_);
                vec![]
            }
        }
    }

    async fn handle_price(&self, raw_msg: &RawWsMessage) -> Vec<WsEvent> {
        let trade: Trade = match raw_msg.decode() {
            Ok(trade) => trade,
            Err(e) => {
                tracing::warn!("Failed to parse price message: {}", e);
                return vec![parse_error(e)];
            }
        };

        let symbol = trade.symbol.clone();
        self.store.write().await.update_price(&symbol, trade.clone());
        vec![WsEvent::Price { symbol, trade }]
    }

    async fn handle_subscribed(&self, raw_msg: &RawWsMessage) -> Vec<WsEvent> {
        let data: SymbolsData = match raw_msg.decode() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to parse subscribed message: {}", e);
                return vec![parse_error(e)];
            }
        };

        let confirmed = self.subscriptions.write().await.apply_subscribed(&data.symbols);
        tracing::debug!("Subscribed: {:?} (now {} confirmed)", data.symbols, confirmed.len());
        self.store.write().await.set_subscribed_symbols(confirmed);
        vec![WsEvent::Subscribed {
            symbols: data.symbols,
        }]
    }

    async fn handle_unsubscribed(&self, raw_msg: &RawWsMessage) -> Vec<WsEvent> {
        let data: SymbolsData = match raw_msg.decode() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to parse unsubscribed message: {}", e);
                return vec![parse_error(e)];
            }
        };

        let confirmed = self.subscriptions.write().await.apply_unsubscribed(&data.symbols);
        tracing::debug!("Unsubscribed: {:?} (now {} confirmed)", data.symbols, confirmed.len());
        self.store.write().await.set_subscribed_symbols(confirmed);
        vec![WsEvent::Unsubscribed {
            symbols: data.symbols,
        }]
    }

    fn handle_error(&self, raw_msg: &RawWsMessage) -> Vec<WsEvent> {
        let data: ErrorData = match raw_msg.decode() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to parse error message: {}", e);
                return vec![parse_error(e)];
            }
        };

        tracing::error!("Server error: {} - {}", data.code, data.message);
        vec![WsEvent::Error {
            error: WebSocketError::ServerError {
                code: data.code,
                message: data.message,
            },
        }]
    }
}

fn parse_error(e: serde_json::Error) -> WsEvent {
    WsEvent::Error {
        error: WebSocketError::MessageParseError(e.to_string()),
    }
}
