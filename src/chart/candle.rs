//! Trade-to-candle aggregation.
//!
//! Trades are bucketed by `floor(t / I) × I` seconds. A trade in a newer
//! bucket opens a candle, a trade in the current bucket merges into it, and a
//! trade in an older bucket is rejected without touching state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::shared::{Interval, Trade};

/// Default number of bars kept by an aggregator.
pub const DEFAULT_MAX_BARS: usize = 1000;

/// One OHLCV bar keyed by its bucket start time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Bucket start (unix seconds)
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl OhlcvBar {
    /// A bar opened by a single trade.
    pub fn from_trade(time: i64, price: f64, quantity: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: quantity,
        }
    }

    fn merge(&mut self, price: f64, quantity: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += quantity;
    }

    /// Close at or above open.
    pub fn is_rising(&self) -> bool {
        self.close >= self.open
    }
}

/// What a trade did to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandleUpdate {
    /// A new bucket started. `closed` is the bar it replaced as current.
    Opened {
        bar: OhlcvBar,
        closed: Option<OhlcvBar>,
    },
    /// The trade merged into the current bar.
    Merged { bar: OhlcvBar },
    /// The trade belongs to a bucket older than the current bar.
    Rejected { bucket: i64, current: i64 },
}

/// Folds a trade stream into fixed-interval bars.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    interval_secs: i64,
    max_bars: usize,
    bars: VecDeque<OhlcvBar>,
}

impl CandleAggregator {
    pub fn new(interval: Interval, max_bars: usize) -> Self {
        Self::with_interval_secs(interval.as_secs(), max_bars)
    }

    /// Aggregator with an arbitrary bucket length.
    pub fn with_interval_secs(interval_secs: i64, max_bars: usize) -> Self {
        Self {
            interval_secs: interval_secs.max(1),
            max_bars: max_bars.max(1),
            bars: VecDeque::new(),
        }
    }

    /// Bucket start for a unix-seconds timestamp.
    pub fn bucket_for(&self, time_secs: i64) -> i64 {
        time_secs.div_euclid(self.interval_secs) * self.interval_secs
    }

    /// Replace all bars with a historical snapshot.
    ///
    /// The snapshot is sorted by time; for repeated times the later entry
    /// wins. The last bar becomes the current candle.
    pub fn seed(&mut self, mut history: Vec<OhlcvBar>) {
        history.sort_by_key(|bar| bar.time);

        self.bars.clear();
        for bar in history {
            match self.bars.back_mut() {
                Some(last) if last.time == bar.time => *last = bar,
                _ => self.bars.push_back(bar),
            }
        }
        while self.bars.len() > self.max_bars {
            self.bars.pop_front();
        }
    }

    /// Apply one trade.
    pub fn on_trade(&mut self, trade: &Trade) -> CandleUpdate {
        let bucket = self.bucket_for(trade.time_secs());

        let current = match self.bars.back_mut() {
            None => {
                let bar = OhlcvBar::from_trade(bucket, trade.price, trade.quantity);
                self.bars.push_back(bar);
                return CandleUpdate::Opened { bar, closed: None };
            }
            Some(current) => current,
        };

        if bucket == current.time {
            current.merge(trade.price, trade.quantity);
            return CandleUpdate::Merged { bar: *current };
        }

        if bucket < current.time {
            tracing::debug!(
                "Rejecting late trade {} for {}: bucket {} < current {}",
                trade.trade_id,
                trade.symbol,
                bucket,
                current.time
            );
            return CandleUpdate::Rejected {
                bucket,
                current: current.time,
            };
        }

        let closed = *current;
        let bar = OhlcvBar::from_trade(bucket, trade.price, trade.quantity);
        self.bars.push_back(bar);
        if self.bars.len() > self.max_bars {
            self.bars.pop_front();
        }
        CandleUpdate::Opened {
            bar,
            closed: Some(closed),
        }
    }

    /// The open candle.
    pub fn current(&self) -> Option<&OhlcvBar> {
        self.bars.back()
    }

    pub fn bars(&self) -> impl DoubleEndedIterator<Item = &OhlcvBar> + ExactSizeIterator {
        self.bars.iter()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    pub fn max_bars(&self) -> usize {
        self.max_bars
    }
}
