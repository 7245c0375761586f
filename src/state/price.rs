//! Per-symbol price state.
//!
//! The store keeps, for every symbol seen on the stream, the latest price, a
//! bounded trade history and statistics derived from that history. Records
//! are handed out as `Arc<SymbolPriceData>` snapshots; the store updates them
//! copy-on-write, so a snapshot held by a reader never changes underneath it.
//!
//! The `*_24h` statistics are computed over the retained history window only.
//! When the window holds less than a day of trades the labels overstate the
//! range they cover. Volume is a running sum over every applied trade and is
//! only reset by an explicit clear.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::registry::SymbolRegistry;
use crate::shared::{ConnectionState, Symbol, Trade};
use crate::state::history::TradeHistory;

/// Store handle shared between the streaming task, the session and renderers.
pub type SharedPriceStore = Arc<RwLock<PriceStore>>;

/// Derived price aggregate for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPriceData {
    pub symbol: Symbol,
    pub current_price: f64,
    pub price_history: TradeHistory,
    /// `current_price` minus the oldest retained price
    pub change_24h: f64,
    /// `change_24h` as a percentage of the oldest retained price
    pub change_percent_24h: f64,
    pub last_update: Option<DateTime<Utc>>,
    pub high_24h: f64,
    pub low_24h: f64,
    /// Running sum of trade quantity
    pub volume_24h: f64,
}

impl SymbolPriceData {
    pub fn new(symbol: Symbol, history_limit: usize) -> Self {
        Self {
            symbol,
            current_price: 0.0,
            price_history: TradeHistory::new(history_limit),
            change_24h: 0.0,
            change_percent_24h: 0.0,
            last_update: None,
            high_24h: 0.0,
            low_24h: 0.0,
            volume_24h: 0.0,
        }
    }

    /// Apply one trade and recompute the window statistics.
    fn apply_trade(&mut self, trade: Trade, now: DateTime<Utc>) {
        self.current_price = trade.price;
        self.volume_24h += trade.quantity;
        self.price_history.push(trade);
        self.recompute_window();
        self.last_update = Some(now);
    }

    fn recompute_window(&mut self) {
        let (high, low) = self
            .price_history
            .price_range()
            .unwrap_or((self.current_price, self.current_price));
        self.high_24h = high;
        self.low_24h = low;

        let first = self
            .price_history
            .oldest()
            .map(|t| t.price)
            .unwrap_or(self.current_price);
        self.change_24h = self.current_price - first;
        self.change_percent_24h = if first == 0.0 {
            0.0
        } else {
            self.change_24h / first * 100.0
        };
    }

    fn reset_history(&mut self) {
        self.price_history.clear();
        self.volume_24h = 0.0;
        self.recompute_window();
    }
}

/// Identifier returned by [`PriceStore::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Change notification delivered to store listeners.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A trade was applied; `data` is the new snapshot for the symbol
    PriceUpdated {
        symbol: Symbol,
        trade: Trade,
        data: Arc<SymbolPriceData>,
    },
    SubscriptionsChanged { symbols: Vec<Symbol> },
    ConnectionChanged { state: ConnectionState },
    /// History was cleared for one symbol, or for all when `symbol` is `None`
    HistoryCleared { symbol: Option<Symbol> },
}

type Listener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

/// Process-wide price state container.
///
/// Every mutation is total and performs no I/O. Listeners run synchronously
/// inside the mutating call and must not re-enter the store.
pub struct PriceStore {
    prices: HashMap<Symbol, Arc<SymbolPriceData>>,
    subscribed_symbols: Vec<Symbol>,
    connection_state: ConnectionState,
    history_limit: usize,
    max_subscriptions: usize,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl std::fmt::Debug for PriceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceStore")
            .field("symbols", &self.prices.len())
            .field("subscribed_symbols", &self.subscribed_symbols)
            .field("connection_state", &self.connection_state)
            .field("history_limit", &self.history_limit)
            .field("max_subscriptions", &self.max_subscriptions)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for PriceStore {
    fn default() -> Self {
        Self::new(&SymbolRegistry::default())
    }
}

impl PriceStore {
    /// Create an empty store bounded by the registry's limits.
    pub fn new(registry: &SymbolRegistry) -> Self {
        Self::with_limits(registry.history_limit(), registry.max_subscriptions())
    }

    pub fn with_limits(history_limit: usize, max_subscriptions: usize) -> Self {
        Self {
            prices: HashMap::new(),
            subscribed_symbols: Vec::new(),
            connection_state: ConnectionState::Disconnected,
            history_limit: history_limit.max(1),
            max_subscriptions: max_subscriptions.max(1),
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    /// Wrap into the shared handle used across tasks.
    pub fn shared(self) -> SharedPriceStore {
        Arc::new(RwLock::new(self))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply a trade to the symbol's aggregate.
    pub fn update_price(&mut self, symbol: &Symbol, trade: Trade) {
        let history_limit = self.history_limit;
        let entry = self
            .prices
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(SymbolPriceData::new(symbol.clone(), history_limit)));

        Arc::make_mut(entry).apply_trade(trade.clone(), Utc::now());
        let data = Arc::clone(entry);

        self.notify(&StoreEvent::PriceUpdated {
            symbol: symbol.clone(),
            trade,
            data,
        });
    }

    /// Replace the subscribed symbol list, truncated to the subscription bound.
    pub fn set_subscribed_symbols(&mut self, symbols: Vec<Symbol>) {
        let mut symbols = symbols;
        symbols.truncate(self.max_subscriptions);
        self.subscribed_symbols = symbols;
        self.notify(&StoreEvent::SubscriptionsChanged {
            symbols: self.subscribed_symbols.clone(),
        });
    }

    /// Reset history and volume for one symbol. The last price is kept.
    pub fn clear_symbol_history(&mut self, symbol: &Symbol) {
        if let Some(entry) = self.prices.get_mut(symbol) {
            Arc::make_mut(entry).reset_history();
        }
        self.notify(&StoreEvent::HistoryCleared {
            symbol: Some(symbol.clone()),
        });
    }

    /// Drop every per-symbol record.
    pub fn clear_all_history(&mut self) {
        self.prices.clear();
        self.notify(&StoreEvent::HistoryCleared { symbol: None });
    }

    /// Mirror the connection state. Only the streaming client writes this.
    #[cfg_attr(not(feature = "websocket"), allow(dead_code))]
    pub(crate) fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection_state == state {
            return;
        }
        self.connection_state = state;
        self.notify(&StoreEvent::ConnectionChanged { state });
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot for a symbol.
    pub fn get(&self, symbol: &Symbol) -> Option<Arc<SymbolPriceData>> {
        self.prices.get(symbol).cloned()
    }

    pub fn current_price(&self, symbol: &Symbol) -> Option<f64> {
        self.prices.get(symbol).map(|d| d.current_price)
    }

    /// Snapshots for every known symbol.
    pub fn snapshot(&self) -> HashMap<Symbol, Arc<SymbolPriceData>> {
        self.prices.clone()
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.prices.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn subscribed_symbols(&self) -> &[Symbol] {
        &self.subscribed_symbols
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn max_subscriptions(&self) -> usize {
        self.max_subscriptions
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a change listener. Keep the id to unregister on teardown.
    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a listener. Returns `false` if the id was unknown.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        before != self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, event: &StoreEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }
}
