//! Historical candle source used to seed a chart.

use std::fmt::Display;
use std::future::Future;

use crate::chart::candle::OhlcvBar;
use crate::shared::{Interval, Symbol};

/// Query parameters for a historical candle fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandlesParams {
    /// Trading pair (required)
    pub symbol: Symbol,
    /// Candle interval
    pub interval: Interval,
    /// Max results (1-1000, gateway default 500)
    pub limit: Option<u32>,
    /// Last candle open time to include (milliseconds)
    pub end_time: Option<i64>,
}

impl CandlesParams {
    pub fn new(symbol: impl Into<Symbol>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            limit: None,
            end_time: None,
        }
    }

    /// Set result limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set end time (milliseconds).
    pub fn with_end_time(mut self, end_time: i64) -> Self {
        self.end_time = Some(end_time);
        self
    }
}

/// Anything that can produce historical bars, ascending by time.
pub trait CandleSource {
    type Error: Display;

    fn fetch_candles(
        &self,
        params: CandlesParams,
    ) -> impl Future<Output = Result<Vec<OhlcvBar>, Self::Error>> + Send;
}
