//! Symbol registry.
//!
//! Static list of tradable pairs plus the bounds the rest of the SDK reads:
//! the default subscription set, the per-symbol trade history capacity and
//! the maximum number of live subscriptions.

use serde::{Deserialize, Serialize};

use crate::shared::{normalize_symbols, Symbol};

/// Default per-symbol trade history capacity.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Default upper bound on concurrently tracked subscriptions.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 10;

/// Symbols subscribed when the caller does not choose any.
pub const DEFAULT_SYMBOLS: [&str; 2] = ["BTCUSDT", "ETHUSDT"];

/// (base asset, quote asset) for every pair the gateway streams.
const SUPPORTED_PAIRS: [(&str, &str); 15] = [
    ("BTC", "USDT"),
    ("ETH", "USDT"),
    ("BNB", "USDT"),
    ("SOL", "USDT"),
    ("XRP", "USDT"),
    ("ADA", "USDT"),
    ("DOGE", "USDT"),
    ("MATIC", "USDT"),
    ("DOT", "USDT"),
    ("AVAX", "USDT"),
    ("LINK", "USDT"),
    ("UNI", "USDT"),
    ("AAVE", "USDT"),
    ("LTC", "USDT"),
    ("ATOM", "USDT"),
];

/// Metadata for one tradable pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: Symbol,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub icon: String,
}

fn default_status() -> String {
    "active".to_string()
}

impl SymbolInfo {
    fn from_pair(base: &str, quote: &str) -> Self {
        Self {
            symbol: Symbol::new(format!("{}{}", base, quote)),
            base_asset: base.to_string(),
            quote_asset: quote.to_string(),
            status: default_status(),
            icon: base.to_lowercase(),
        }
    }

    /// Derive metadata for a symbol outside the supported list.
    ///
    /// The base asset is the symbol with `USDT`/`BUSD` removed; the quote is
    /// `USDT` when the symbol contains it and `BUSD` otherwise.
    pub fn derived(symbol: &Symbol) -> Self {
        let raw = symbol.as_str();
        let base = raw.replace("USDT", "").replace("BUSD", "");
        let quote = if raw.contains("USDT") { "USDT" } else { "BUSD" };
        Self {
            symbol: symbol.clone(),
            icon: base.to_lowercase(),
            base_asset: base,
            quote_asset: quote.to_string(),
            status: default_status(),
        }
    }
}

/// Static registry of symbols and subscription bounds.
#[derive(Debug, Clone)]
pub struct SymbolRegistry {
    supported: Vec<SymbolInfo>,
    default_symbols: Vec<Symbol>,
    history_limit: usize,
    max_subscriptions: usize,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self {
            supported: SUPPORTED_PAIRS
                .iter()
                .map(|(base, quote)| SymbolInfo::from_pair(base, quote))
                .collect(),
            default_symbols: normalize_symbols(DEFAULT_SYMBOLS),
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
        }
    }
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default subscription set. Truncated to `max_subscriptions`.
    pub fn with_default_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.default_symbols = normalize_symbols(symbols);
        self.default_symbols.truncate(self.max_subscriptions);
        self
    }

    /// Set the per-symbol trade history capacity (minimum 1).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Set the subscription bound (minimum 1). The default set is re-truncated.
    pub fn with_max_subscriptions(mut self, max: usize) -> Self {
        self.max_subscriptions = max.max(1);
        self.default_symbols.truncate(self.max_subscriptions);
        self
    }

    pub fn supported(&self) -> &[SymbolInfo] {
        &self.supported
    }

    pub fn default_symbols(&self) -> &[Symbol] {
        &self.default_symbols
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn max_subscriptions(&self) -> usize {
        self.max_subscriptions
    }

    pub fn is_supported(&self, symbol: &Symbol) -> bool {
        self.supported.iter().any(|info| &info.symbol == symbol)
    }

    /// Metadata for a symbol, derived when it is not in the supported list.
    pub fn lookup(&self, symbol: impl Into<Symbol>) -> SymbolInfo {
        let symbol = symbol.into();
        self.supported
            .iter()
            .find(|info| info.symbol == symbol)
            .cloned()
            .unwrap_or_else(|| SymbolInfo::derived(&symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let registry = SymbolRegistry::default();
        assert_eq!(registry.supported().len(), 15);
        assert_eq!(registry.history_limit(), 100);
        assert_eq!(registry.max_subscriptions(), 10);
        assert_eq!(
            registry.default_symbols(),
            &[Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")]
        );
    }

    #[test]
    fn test_lookup_supported() {
        let registry = SymbolRegistry::default();
        let info = registry.lookup("solusdt");
        assert_eq!(info.symbol.as_str(), "SOLUSDT");
        assert_eq!(info.base_asset, "SOL");
        assert_eq!(info.quote_asset, "USDT");
        assert_eq!(info.icon, "sol");
        assert_eq!(info.status, "active");
    }

    #[test]
    fn test_lookup_derives_unknown() {
        let registry = SymbolRegistry::default();

        let info = registry.lookup("PEPEUSDT");
        assert!(!registry.is_supported(&info.symbol));
        assert_eq!(info.base_asset, "PEPE");
        assert_eq!(info.quote_asset, "USDT");
        assert_eq!(info.icon, "pepe");

        let info = registry.lookup("btcbusd");
        assert_eq!(info.base_asset, "BTC");
        assert_eq!(info.quote_asset, "BUSD");
    }

    #[test]
    fn test_default_symbols_truncated_to_bound() {
        let registry = SymbolRegistry::default()
            .with_default_symbols(["btcusdt", "ethusdt", "solusdt"])
            .with_max_subscriptions(2);
        assert_eq!(registry.default_symbols().len(), 2);
        assert_eq!(registry.default_symbols()[0].as_str(), "BTCUSDT");
    }

    #[test]
    fn test_limits_have_floor_of_one() {
        let registry = SymbolRegistry::default()
            .with_history_limit(0)
            .with_max_subscriptions(0);
        assert_eq!(registry.history_limit(), 1);
        assert_eq!(registry.max_subscriptions(), 1);
    }

    #[test]
    fn test_symbol_info_deserializes_without_status() {
        let json = r#"{"symbol":"btcusdt","base_asset":"BTC","quote_asset":"USDT","icon":"btc"}"#;
        let info: SymbolInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.symbol.as_str(), "BTCUSDT");
        assert_eq!(info.status, "active");
    }
}
