//! Chart renderer: keeps a [`ChartSurface`] in sync with history and live
//! trades for one symbol and interval.
//!
//! Lifecycle:
//!
//! 1. `load_history` (or `begin_load` + `apply_history` when the fetch runs
//!    elsewhere) seeds candles, volume and moving averages.
//! 2. `attach` registers a price store listener; trades for the chart's
//!    symbol queue on a bounded channel. Overflow is dropped and counted.
//! 3. `drain` applies queued trades in delivery order once history is
//!    ready. A failed load discards the queue.
//! 4. `detach` unregisters the listener on teardown.
//!
//! A fetch completion carries the [`LoadTicket`] it was started with. If the
//! context changed or a newer load started in the meantime, the result is
//! discarded.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::chart::candle::{CandleAggregator, CandleUpdate, OhlcvBar, DEFAULT_MAX_BARS};
use crate::chart::indicators::{sma_points, MovingAverage};
use crate::chart::source::{CandleSource, CandlesParams};
use crate::chart::surface::{ChartSurface, SeriesId, SeriesPoint};
use crate::shared::{Interval, Symbol, Trade};
use crate::state::{ListenerId, SharedPriceStore, StoreEvent};

/// Default moving-average periods.
pub const DEFAULT_MA_PERIODS: [usize; 2] = [7, 25];

/// Default number of historical bars requested.
pub const DEFAULT_HISTORY_BARS: u32 = 500;

/// Default capacity of the live trade queue.
pub const DEFAULT_FEED_CAPACITY: usize = 10_000;

/// Chart configuration.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub interval: Interval,
    /// Bars requested from the candle source
    pub history_bars: u32,
    /// Bars kept in memory
    pub max_bars: usize,
    pub ma_periods: Vec<usize>,
    /// Trades held between drains before new ones are dropped
    pub feed_capacity: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            interval: Interval::OneMinute,
            history_bars: DEFAULT_HISTORY_BARS,
            max_bars: DEFAULT_MAX_BARS,
            ma_periods: DEFAULT_MA_PERIODS.to_vec(),
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl ChartConfig {
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_history_bars(mut self, bars: u32) -> Self {
        self.history_bars = bars;
        self
    }

    pub fn with_ma_periods(mut self, periods: Vec<usize>) -> Self {
        self.ma_periods = periods;
        self
    }

    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }
}

/// Progress of the historical snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryState {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Fetch failed; live updates wait for a successful `retry`
    Failed(String),
}

/// Token identifying one history load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    params: CandlesParams,
}

impl LoadTicket {
    pub fn params(&self) -> &CandlesParams {
        &self.params
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct TradeFeed {
    listener: ListenerId,
    rx: mpsc::Receiver<Trade>,
    /// Symbol the listener forwards; follows `set_context`
    symbol: Arc<RwLock<Symbol>>,
    /// Trades dropped on a full queue since the last drain
    dropped: Arc<AtomicU64>,
}

impl TradeFeed {
    fn discard_queued(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Renders one symbol/interval onto a chart surface.
pub struct ChartRenderer<S: ChartSurface> {
    surface: S,
    config: ChartConfig,
    symbol: Symbol,
    interval: Interval,
    aggregator: CandleAggregator,
    averages: Vec<MovingAverage>,
    generation: u64,
    history: HistoryState,
    size: Option<(u32, u32)>,
    feed: Option<TradeFeed>,
}

impl<S: ChartSurface> std::fmt::Debug for ChartRenderer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartRenderer")
            .field("symbol", &self.symbol)
            .field("interval", &self.interval)
            .field("bars", &self.aggregator.len())
            .field("generation", &self.generation)
            .field("history", &self.history)
            .field("attached", &self.feed.is_some())
            .finish()
    }
}

impl<S: ChartSurface> ChartRenderer<S> {
    pub fn new(surface: S, symbol: impl Into<Symbol>, config: ChartConfig) -> Self {
        let interval = config.interval;
        Self {
            aggregator: CandleAggregator::new(interval, config.max_bars),
            averages: config.ma_periods.iter().map(|&p| MovingAverage::new(p)).collect(),
            surface,
            config,
            symbol: symbol.into(),
            interval,
            generation: 0,
            history: HistoryState::Idle,
            size: None,
            feed: None,
        }
    }

    // =========================================================================
    // Context and history
    // =========================================================================

    /// Switch symbol and/or interval. Clears every series, invalidates any
    /// in-flight load and drops queued trades.
    pub fn set_context(&mut self, symbol: impl Into<Symbol>, interval: Interval) {
        self.symbol = symbol.into();
        self.interval = interval;
        self.generation += 1;
        self.history = HistoryState::Idle;
        self.aggregator = CandleAggregator::new(interval, self.config.max_bars);
        for ma in &mut self.averages {
            ma.clear();
        }
        if let Some(feed) = &mut self.feed {
            if let Ok(mut symbol) = feed.symbol.write() {
                *symbol = self.symbol.clone();
            }
            feed.discard_queued();
        }

        for series in self.series_ids() {
            self.surface.set_data(series, Vec::new());
        }
        tracing::debug!("Chart context now {} @ {}", self.symbol, self.interval);
    }

    /// Start a history load. Any earlier ticket becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.history = HistoryState::Loading;
        LoadTicket {
            generation: self.generation,
            params: CandlesParams::new(&self.symbol, self.interval).with_limit(self.config.history_bars),
        }
    }

    /// Complete a history load. Returns `false` if the ticket is stale and
    /// the result was discarded.
    pub fn apply_history<E: Display>(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<OhlcvBar>, E>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                "Discarding stale history for {} @ {}",
                ticket.params.symbol,
                ticket.params.interval
            );
            return false;
        }

        match result {
            Ok(bars) => {
                self.seed(bars);
                self.history = HistoryState::Ready;
            }
            Err(e) => {
                tracing::warn!(
                    "History fetch failed for {} @ {}: {}",
                    self.symbol,
                    self.interval,
                    e
                );
                self.history = HistoryState::Failed(e.to_string());
                if let Some(feed) = &mut self.feed {
                    let discarded = feed.discard_queued();
                    if discarded > 0 {
                        tracing::debug!("Discarded {} queued trades after failed load", discarded);
                    }
                }
            }
        }
        true
    }

    /// Fetch and apply history in one step.
    pub async fn load_history<C: CandleSource>(&mut self, source: &C) -> bool {
        let ticket = self.begin_load();
        let result = source.fetch_candles(ticket.params.clone()).await;
        self.apply_history(ticket, result)
    }

    /// Reload history unless it is already `Ready`. A load left in
    /// `Loading` by a dropped future is restarted; its ticket goes stale.
    pub async fn retry<C: CandleSource>(&mut self, source: &C) -> bool {
        if self.history == HistoryState::Ready {
            return false;
        }
        self.load_history(source).await
    }

    fn seed(&mut self, bars: Vec<OhlcvBar>) {
        self.aggregator.seed(bars);
        let bars: Vec<OhlcvBar> = self.aggregator.bars().copied().collect();
        let closes = self.aggregator.closes();

        self.surface.set_data(
            SeriesId::Candles,
            bars.iter().copied().map(SeriesPoint::Candle).collect(),
        );
        self.surface.set_data(
            SeriesId::Volume,
            bars.iter().map(SeriesPoint::volume).collect(),
        );

        for ma in &mut self.averages {
            ma.seed(&closes);
            let points = sma_points(&bars, ma.period())
                .into_iter()
                .map(|(time, value)| SeriesPoint::Line { time, value })
                .collect();
            self.surface.set_data(SeriesId::MovingAverage(ma.period()), points);
        }

        tracing::info!(
            "Chart seeded with {} bars for {} @ {}",
            bars.len(),
            self.symbol,
            self.interval
        );
    }

    // =========================================================================
    // Live updates
    // =========================================================================

    /// Apply one trade. Returns `None` for trades of another symbol.
    ///
    /// Moving averages gain a point when a bar closes; the open bar has none.
    pub fn on_trade(&mut self, trade: &Trade) -> Option<CandleUpdate> {
        if trade.symbol != self.symbol {
            return None;
        }

        let update = self.aggregator.on_trade(trade);
        match update {
            CandleUpdate::Opened { bar, closed } => {
                self.surface.update(SeriesId::Candles, SeriesPoint::Candle(bar));
                self.surface.update(SeriesId::Volume, SeriesPoint::volume(&bar));

                for ma in &mut self.averages {
                    if let Some(closed) = closed {
                        if let Some(value) = ma.set_last(closed.close) {
                            self.surface.update(
                                SeriesId::MovingAverage(ma.period()),
                                SeriesPoint::Line {
                                    time: closed.time,
                                    value,
                                },
                            );
                        }
                    }
                    ma.push(bar.close);
                }
            }
            CandleUpdate::Merged { bar } => {
                self.surface.update(SeriesId::Candles, SeriesPoint::Candle(bar));
                self.surface.update(SeriesId::Volume, SeriesPoint::volume(&bar));
            }
            CandleUpdate::Rejected { .. } => {}
        }
        Some(update)
    }

    /// Start receiving this store's trades for the chart's symbol.
    pub async fn attach(&mut self, store: &SharedPriceStore) {
        if self.feed.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel(self.config.feed_capacity.max(1));
        let symbol = Arc::new(RwLock::new(self.symbol.clone()));
        let dropped = Arc::new(AtomicU64::new(0));

        let filter = symbol.clone();
        let drop_count = dropped.clone();
        let listener = store.write().await.add_listener(move |event| {
            let StoreEvent::PriceUpdated { symbol, trade, .. } = event else {
                return;
            };
            let wanted = filter.read().map(|s| *s == *symbol).unwrap_or(false);
            if !wanted {
                return;
            }
            match tx.try_send(trade.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    if drop_count.fetch_add(1, Ordering::Relaxed) == 0 {
                        tracing::warn!("Chart trade queue full for {}, dropping trades", symbol);
                    }
                }
                Err(TrySendError::Closed(_)) => {}
            }
        });

        self.feed = Some(TradeFeed {
            listener,
            rx,
            symbol,
            dropped,
        });
    }

    /// Unregister from the store. Queued trades are dropped.
    pub async fn detach(&mut self, store: &SharedPriceStore) -> bool {
        match self.feed.take() {
            Some(feed) => store.write().await.remove_listener(feed.listener),
            None => false,
        }
    }

    /// Apply queued trades in delivery order. Trades stay queued until
    /// history is ready. Returns the number applied to this chart.
    pub fn drain(&mut self) -> usize {
        if self.history != HistoryState::Ready {
            return 0;
        }
        let mut trades = Vec::new();
        if let Some(feed) = &mut self.feed {
            while let Ok(trade) = feed.rx.try_recv() {
                trades.push(trade);
            }
            let dropped = feed.dropped.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                tracing::warn!("Chart dropped {} trades for {} on a full queue", dropped, self.symbol);
            }
        }
        trades
            .iter()
            .filter(|trade| self.on_trade(trade).is_some())
            .count()
    }

    /// Apply host viewport dimensions. Returns `false` when unchanged.
    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        if self.size == Some((width, height)) {
            return false;
        }
        self.size = Some((width, height));
        self.surface.resize(width, height);
        true
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    fn series_ids(&self) -> Vec<SeriesId> {
        let mut ids = vec![SeriesId::Candles, SeriesId::Volume];
        ids.extend(self.averages.iter().map(|ma| SeriesId::MovingAverage(ma.period())));
        ids
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn history_state(&self) -> &HistoryState {
        &self.history
    }

    pub fn current_candle(&self) -> Option<&OhlcvBar> {
        self.aggregator.current()
    }

    pub fn bars(&self) -> Vec<OhlcvBar> {
        self.aggregator.bars().copied().collect()
    }

    pub fn is_attached(&self) -> bool {
        self.feed.is_some()
    }

    /// Trades waiting for the next `drain`.
    pub fn queued_trades(&self) -> usize {
        self.feed.as_ref().map(|feed| feed.rx.len()).unwrap_or(0)
    }

    /// Trades dropped on a full queue since the last `drain`.
    pub fn dropped_trades(&self) -> u64 {
        self.feed
            .as_ref()
            .map(|feed| feed.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::surface::{RecordingSurface, SurfaceCall};
    use crate::state::PriceStore;

    struct FixedSource(Vec<OhlcvBar>);

    impl CandleSource for FixedSource {
        type Error = String;

        async fn fetch_candles(&self, _params: CandlesParams) -> Result<Vec<OhlcvBar>, String> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl CandleSource for FailingSource {
        type Error = String;

        async fn fetch_candles(&self, _params: CandlesParams) -> Result<Vec<OhlcvBar>, String> {
            Err("upstream unavailable".to_string())
        }
    }

    fn trade(symbol: &str, time_secs: i64, price: f64) -> Trade {
        Trade {
            symbol: Symbol::new(symbol),
            price,
            quantity: 0.5,
            timestamp: time_secs * 1000,
            trade_id: time_secs,
            is_buyer_maker: false,
        }
    }

    fn history(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar::from_trade(i as i64 * 60, c, 1.0))
            .collect()
    }

    fn renderer() -> ChartRenderer<RecordingSurface> {
        ChartRenderer::new(
            RecordingSurface::new(),
            "BTCUSDT",
            ChartConfig::default().with_ma_periods(vec![2]),
        )
    }

    #[tokio::test]
    async fn test_load_history_seeds_all_series() {
        let mut chart = renderer();
        assert!(chart.load_history(&FixedSource(history(&[1.0, 2.0, 3.0]))).await);
        assert_eq!(chart.history_state(), &HistoryState::Ready);

        let surface = chart.surface();
        assert_eq!(surface.series(SeriesId::Candles).len(), 3);
        assert_eq!(surface.series(SeriesId::Volume).len(), 3);
        assert_eq!(
            surface.series(SeriesId::MovingAverage(2)),
            &[
                SeriesPoint::Line { time: 60, value: 1.5 },
                SeriesPoint::Line { time: 120, value: 2.5 },
            ]
        );
        assert_eq!(chart.current_candle().map(|b| b.time), Some(120));
    }

    #[tokio::test]
    async fn test_failed_load_then_retry() {
        let mut chart = renderer();
        chart.load_history(&FailingSource).await;
        assert_eq!(
            chart.history_state(),
            &HistoryState::Failed("upstream unavailable".to_string())
        );

        assert!(chart.retry(&FixedSource(history(&[1.0]))).await);
        assert_eq!(chart.history_state(), &HistoryState::Ready);

        assert!(!chart.retry(&FixedSource(history(&[1.0]))).await);
    }

    #[test]
    fn test_stale_ticket_discarded() {
        let mut chart = renderer();
        let stale = chart.begin_load();
        chart.set_context("ETHUSDT", Interval::FiveMinutes);
        let fresh = chart.begin_load();
        assert_eq!(fresh.params().symbol.as_str(), "ETHUSDT");
        assert_eq!(fresh.params().interval, Interval::FiveMinutes);

        assert!(!chart.apply_history::<String>(stale, Ok(history(&[9.0, 9.0]))));
        assert!(chart.bars().is_empty());
        assert_eq!(chart.history_state(), &HistoryState::Loading);

        assert!(chart.apply_history::<String>(fresh, Ok(history(&[1.0]))));
        assert_eq!(chart.bars().len(), 1);
    }

    #[test]
    fn test_on_trade_updates_series_and_ma_on_close() {
        let mut chart = renderer();
        let ticket = chart.begin_load();
        chart.apply_history::<String>(ticket, Ok(history(&[1.0, 2.0])));
        chart.surface_mut().clear_calls();

        // Merges into the bar at t=60 and revises its close to 4.0
        chart.on_trade(&trade("BTCUSDT", 90, 4.0));
        // Opens t=120; the t=60 bar closes, MA(2) = (1 + 4) / 2
        chart.on_trade(&trade("BTCUSDT", 125, 5.0));

        let calls = chart.surface().calls();
        assert!(calls.contains(&SurfaceCall::Update(
            SeriesId::MovingAverage(2),
            SeriesPoint::Line { time: 60, value: 2.5 }
        )));
        assert_eq!(chart.surface().series(SeriesId::Candles).len(), 3);
        let ma = chart.surface().series(SeriesId::MovingAverage(2));
        assert_eq!(ma.last(), Some(&SeriesPoint::Line { time: 60, value: 2.5 }));
    }

    #[test]
    fn test_other_symbol_ignored() {
        let mut chart = renderer();
        assert!(chart.on_trade(&trade("ETHUSDT", 0, 1.0)).is_none());
        assert!(chart.surface().calls().is_empty());
    }

    #[tokio::test]
    async fn test_attach_drain_detach() {
        let store = PriceStore::with_limits(100, 10).shared();
        let mut chart = renderer();
        chart.attach(&store).await;
        assert_eq!(store.read().await.listener_count(), 1);

        {
            let mut guard = store.write().await;
            let t = trade("BTCUSDT", 0, 10.0);
            guard.update_price(&t.symbol, t.clone());
            let t = trade("ETHUSDT", 1, 20.0);
            guard.update_price(&t.symbol, t.clone());
            let t = trade("BTCUSDT", 61, 11.0);
            guard.update_price(&t.symbol, t.clone());
        }

        // Queued until history is ready
        assert_eq!(chart.drain(), 0);
        let ticket = chart.begin_load();
        chart.apply_history::<String>(ticket, Ok(Vec::new()));
        assert_eq!(chart.drain(), 2);
        assert_eq!(chart.bars().len(), 2);

        assert!(chart.detach(&store).await);
        assert_eq!(store.read().await.listener_count(), 0);
        assert!(!chart.detach(&store).await);
    }

    #[tokio::test]
    async fn test_retry_after_abandoned_load() {
        let mut chart = renderer();
        // A load whose future was dropped before it resolved
        let abandoned = chart.begin_load();
        assert_eq!(chart.history_state(), &HistoryState::Loading);

        assert!(chart.retry(&FixedSource(history(&[1.0, 2.0]))).await);
        assert_eq!(chart.history_state(), &HistoryState::Ready);
        assert_eq!(chart.bars().len(), 2);

        assert!(!chart.apply_history::<String>(abandoned, Ok(history(&[5.0]))));
        assert_eq!(chart.bars().len(), 2);
    }

    #[tokio::test]
    async fn test_feed_queues_only_chart_symbol() {
        let store = PriceStore::with_limits(100, 10).shared();
        let mut chart = renderer();
        chart.attach(&store).await;

        {
            let mut guard = store.write().await;
            for t in [trade("ETHUSDT", 0, 1.0), trade("BTCUSDT", 1, 2.0), trade("SOLUSDT", 2, 3.0)] {
                guard.update_price(&t.symbol.clone(), t);
            }
        }
        assert_eq!(chart.queued_trades(), 1);

        chart.set_context("ETHUSDT", Interval::OneMinute);
        assert_eq!(chart.queued_trades(), 0);
        {
            let mut guard = store.write().await;
            for t in [trade("BTCUSDT", 3, 4.0), trade("ETHUSDT", 4, 5.0)] {
                guard.update_price(&t.symbol.clone(), t);
            }
        }
        assert_eq!(chart.queued_trades(), 1);
    }

    #[tokio::test]
    async fn test_feed_drops_overflow_and_counts() {
        let store = PriceStore::with_limits(100, 10).shared();
        let mut chart = ChartRenderer::new(
            RecordingSurface::new(),
            "BTCUSDT",
            ChartConfig::default().with_feed_capacity(2),
        );
        chart.attach(&store).await;

        {
            let mut guard = store.write().await;
            for i in 0..5 {
                let t = trade("BTCUSDT", i, 10.0 + i as f64);
                guard.update_price(&t.symbol.clone(), t);
            }
        }
        assert_eq!(chart.queued_trades(), 2);
        assert_eq!(chart.dropped_trades(), 3);

        let ticket = chart.begin_load();
        chart.apply_history::<String>(ticket, Ok(Vec::new()));
        assert_eq!(chart.drain(), 2);
        assert_eq!(chart.dropped_trades(), 0);
        assert_eq!(chart.current_candle().map(|b| b.close), Some(11.0));
    }

    #[tokio::test]
    async fn test_failed_load_discards_queue() {
        let store = PriceStore::with_limits(100, 10).shared();
        let mut chart = renderer();
        chart.attach(&store).await;

        {
            let mut guard = store.write().await;
            let t = trade("BTCUSDT", 0, 10.0);
            guard.update_price(&t.symbol.clone(), t);
        }
        assert_eq!(chart.queued_trades(), 1);

        chart.load_history(&FailingSource).await;
        assert_eq!(chart.queued_trades(), 0);

        assert!(chart.retry(&FixedSource(Vec::new())).await);
        assert_eq!(chart.drain(), 0);
        assert!(chart.bars().is_empty());
    }

    #[test]
    fn test_resize_applied_on_change_only() {
        let mut chart = renderer();
        assert!(chart.on_resize(800, 400));
        assert!(!chart.on_resize(800, 400));
        assert!(chart.on_resize(1024, 400));
        assert_eq!(chart.surface().size(), Some((1024, 400)));
        assert_eq!(chart.surface().calls().len(), 2);
    }
}
