//! Fixed-capacity trade history ring.

use std::collections::VecDeque;

use crate::shared::Trade;

/// Rolling trade history for one symbol, oldest first.
///
/// Pushing at capacity evicts the oldest trade. Both ends are O(1).
#[derive(Debug, Clone, PartialEq)]
pub struct TradeHistory {
    trades: VecDeque<Trade>,
    max_size: usize,
}

impl TradeHistory {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            trades: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push a new trade, evicting the oldest if at capacity.
    pub fn push(&mut self, trade: Trade) -> Option<Trade> {
        let evicted = if self.trades.len() >= self.max_size {
            self.trades.pop_front()
        } else {
            None
        };
        self.trades.push_back(trade);
        evicted
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Trade> + ExactSizeIterator {
        self.trades.iter()
    }

    pub fn oldest(&self) -> Option<&Trade> {
        self.trades.front()
    }

    pub fn latest(&self) -> Option<&Trade> {
        self.trades.back()
    }

    /// Highest and lowest price over the retained window.
    pub fn price_range(&self) -> Option<(f64, f64)> {
        let mut prices = self.trades.iter().map(|t| t.price);
        let first = prices.next()?;
        Some(prices.fold((first, first), |(high, low), p| (high.max(p), low.min(p))))
    }

    pub fn to_vec(&self) -> Vec<Trade> {
        self.trades.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Symbol;

    fn make_trade(id: i64, price: f64) -> Trade {
        Trade {
            symbol: Symbol::new("BTCUSDT"),
            price,
            quantity: 1.0,
            timestamp: id * 1000,
            trade_id: id,
            is_buyer_maker: false,
        }
    }

    #[test]
    fn test_push_and_evict() {
        let mut history = TradeHistory::new(3);
        for i in 0..5 {
            history.push(make_trade(i, 100.0 + i as f64));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.oldest().unwrap().trade_id, 2);
        assert_eq!(history.latest().unwrap().trade_id, 4);
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut history = TradeHistory::new(1);
        assert!(history.push(make_trade(1, 1.0)).is_none());
        let evicted = history.push(make_trade(2, 2.0)).unwrap();
        assert_eq!(evicted.trade_id, 1);
    }

    #[test]
    fn test_price_range() {
        let mut history = TradeHistory::new(10);
        assert!(history.price_range().is_none());
        for (i, p) in [105.0, 99.0, 120.0, 101.0].iter().enumerate() {
            history.push(make_trade(i as i64, *p));
        }
        assert_eq!(history.price_range(), Some((120.0, 99.0)));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let history = TradeHistory::new(0);
        assert_eq!(history.capacity(), 1);
    }

    #[test]
    fn test_clear() {
        let mut history = TradeHistory::new(2);
        history.push(make_trade(1, 1.0));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
