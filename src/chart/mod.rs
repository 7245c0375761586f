//! Candle aggregation and chart synchronization.
//!
//! - [`CandleAggregator`] folds trades into fixed-interval OHLCV bars.
//! - [`indicators`] computes simple moving averages, batch and incremental.
//! - [`ChartRenderer`] drives a [`ChartSurface`] from a [`CandleSource`]
//!   snapshot plus live trades from the price store.

pub mod candle;
pub mod indicators;
pub mod renderer;
pub mod source;
pub mod surface;

pub use candle::{CandleAggregator, CandleUpdate, OhlcvBar, DEFAULT_MAX_BARS};
pub use indicators::{sma, sma_points, MovingAverage};
pub use renderer::{
    ChartConfig, ChartRenderer, HistoryState, LoadTicket, DEFAULT_HISTORY_BARS, DEFAULT_MA_PERIODS,
};
pub use source::{CandleSource, CandlesParams};
pub use surface::{ChartSurface, RecordingSurface, SeriesId, SeriesPoint, SurfaceCall};
