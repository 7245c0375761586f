//! Response types for the Quantboard REST API.

use serde::{Deserialize, Serialize};

use crate::chart::OhlcvBar;
use crate::registry::SymbolInfo;
use crate::shared::{Interval, Symbol};

pub use crate::chart::CandlesParams;

/// Response for GET /api/candles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandlesResponse {
    pub symbol: Symbol,
    pub interval: Interval,
    /// Ascending by time
    pub candles: Vec<OhlcvBar>,
}

/// Response for GET /api/symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedSymbolsResponse {
    pub symbols: Vec<SymbolInfo>,
    pub default_symbols: Vec<Symbol>,
}
