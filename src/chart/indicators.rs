// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
//   SMA_t = (close_{t-period+1} + ... + close_t) / period
//
// Defined only once `period` closes exist. The incremental tracker keeps the
// trailing window and re-sums it on every step, so its output is bit-for-bit
// the batch value.
// =============================================================================

use std::collections::VecDeque;

use crate::chart::candle::OhlcvBar;

/// Compute the SMA series for `closes`.
///
/// Each output element corresponds to a close starting at index
/// `period - 1`. Returns an empty `Vec` when `period == 0` or the input is
/// shorter than `period`.
pub fn sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }
    closes
        .windows(period)
        .map(|window| window.iter().sum::<f64>() / period as f64)
        .collect()
}

/// SMA over bar closes as `(time, value)` pairs.
pub fn sma_points(bars: &[OhlcvBar], period: usize) -> Vec<(i64, f64)> {
    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let values = sma(&closes, period);
    let offset = bars.len() - values.len();
    bars[offset..]
        .iter()
        .zip(values)
        .map(|(bar, value)| (bar.time, value))
        .collect()
}

/// Incremental SMA over a stream of closes.
///
/// The last pushed close may be provisional (an open candle) and revised
/// with [`set_last`](Self::set_last) once final.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
    window: VecDeque<f64>,
}

impl MovingAverage {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    /// Reset to the trailing window of `closes`.
    pub fn seed(&mut self, closes: &[f64]) {
        self.window.clear();
        let start = closes.len().saturating_sub(self.period);
        self.window.extend(closes[start..].iter().copied());
    }

    /// Append a close. Returns the SMA ending at it, if defined.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(close);
        self.value()
    }

    /// Revise the most recent close. Returns the SMA ending at it, if defined.
    pub fn set_last(&mut self, close: f64) -> Option<f64> {
        match self.window.back_mut() {
            Some(last) => *last = close,
            None => self.window.push_back(close),
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.window.len() < self.period {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.period as f64)
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}
