//! Price store → chart renderer → surface, end to end.

use std::sync::atomic::{AtomicUsize, Ordering};

use quantboard::chart::{
    CandleSource, CandleUpdate, CandlesParams, ChartConfig, ChartRenderer, HistoryState,
    OhlcvBar, RecordingSurface, SeriesId, SeriesPoint, SurfaceCall,
};
use quantboard::prelude::*;

fn trade(symbol: &str, time_secs: i64, price: f64) -> Trade {
    Trade {
        symbol: Symbol::new(symbol),
        price,
        quantity: 1.0,
        timestamp: time_secs * 1000,
        trade_id: time_secs,
        is_buyer_maker: false,
    }
}

fn bar(time: i64, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        time,
        open,
        high,
        low,
        close,
        volume: 0.0,
    }
}

/// Candle source that records what it was asked for.
#[derive(Default)]
struct ScriptedSource {
    bars: Vec<OhlcvBar>,
    fail: bool,
    calls: AtomicUsize,
}

impl CandleSource for ScriptedSource {
    type Error = String;

    async fn fetch_candles(&self, params: CandlesParams) -> Result<Vec<OhlcvBar>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(params.limit, Some(500));
        if self.fail {
            return Err(format!("HTTP 503 for {}", params.symbol));
        }
        Ok(self.bars.clone())
    }
}

fn candles(surface: &RecordingSurface) -> Vec<OhlcvBar> {
    surface
        .series(SeriesId::Candles)
        .iter()
        .map(|p| match p {
            SeriesPoint::Candle(bar) => OhlcvBar { volume: 0.0, ..*bar },
            other => panic!("Expected candle point, got {:?}", other),
        })
        .collect()
}

#[tokio::test]
async fn test_trades_fold_into_minute_candles() {
    let mut chart = ChartRenderer::new(RecordingSurface::new(), "BTCUSDT", ChartConfig::default());
    chart.load_history(&ScriptedSource::default()).await;

    for t in [trade("BTCUSDT", 0, 100.0), trade("BTCUSDT", 30, 110.0), trade("BTCUSDT", 65, 90.0)] {
        chart.on_trade(&t);
    }

    assert_eq!(
        candles(chart.surface()),
        vec![bar(0, 100.0, 110.0, 100.0, 110.0), bar(60, 90.0, 90.0, 90.0, 90.0)]
    );
}

#[test]
fn test_late_trade_leaves_chart_untouched() {
    let source = ScriptedSource {
        bars: vec![bar(0, 1.0, 1.0, 1.0, 1.0), bar(60, 2.0, 2.0, 2.0, 2.0)],
        ..Default::default()
    };
    let mut chart = ChartRenderer::new(RecordingSurface::new(), "BTCUSDT", ChartConfig::default());
    tokio_test::block_on(chart.load_history(&source));
    chart.surface_mut().clear_calls();

    let before = chart.bars();
    let update = chart.on_trade(&trade("BTCUSDT", 59, 500.0));

    assert_eq!(
        update,
        Some(CandleUpdate::Rejected {
            bucket: 0,
            current: 60
        })
    );
    assert_eq!(chart.bars(), before);
    assert!(chart.surface().calls().is_empty());
}

#[tokio::test]
async fn test_stale_history_discarded_after_context_switch() {
    let mut chart = ChartRenderer::new(RecordingSurface::new(), "BTCUSDT", ChartConfig::default());

    let btc_ticket = chart.begin_load();
    chart.set_context("ETHUSDT", Interval::OneHour);
    let eth_ticket = chart.begin_load();

    // ETH resolves first, then the slow BTC fetch lands
    assert!(chart.apply_history::<String>(eth_ticket, Ok(vec![bar(3600, 5.0, 6.0, 4.0, 5.5)])));
    assert!(!chart.apply_history::<String>(btc_ticket, Ok(vec![bar(0, 1.0, 1.0, 1.0, 1.0)])));

    assert_eq!(chart.symbol().as_str(), "ETHUSDT");
    assert_eq!(candles(chart.surface()), vec![bar(3600, 5.0, 6.0, 4.0, 5.5)]);
}

#[tokio::test]
async fn test_fetch_failure_is_recoverable() {
    let failing = ScriptedSource {
        fail: true,
        ..Default::default()
    };
    let mut chart = ChartRenderer::new(RecordingSurface::new(), "BTCUSDT", ChartConfig::default());
    chart.load_history(&failing).await;
    assert_eq!(
        chart.history_state(),
        &HistoryState::Failed("HTTP 503 for BTCUSDT".to_string())
    );

    let ok = ScriptedSource {
        bars: vec![bar(0, 1.0, 1.0, 1.0, 1.0)],
        ..Default::default()
    };
    assert!(chart.retry(&ok).await);
    assert_eq!(chart.history_state(), &HistoryState::Ready);
    assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_moving_averages_match_batch_as_bars_close() {
    let history: Vec<OhlcvBar> = (0..30)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.7).sin() * 5.0;
            bar(i * 60, close, close, close, close)
        })
        .collect();
    let source = ScriptedSource {
        bars: history.clone(),
        ..Default::default()
    };

    let mut chart = ChartRenderer::new(RecordingSurface::new(), "BTCUSDT", ChartConfig::default());
    chart.load_history(&source).await;

    let ma7 = chart.surface().series(SeriesId::MovingAverage(7)).to_vec();
    let ma25 = chart.surface().series(SeriesId::MovingAverage(25)).to_vec();
    assert_eq!(ma7.len(), 24);
    assert_eq!(ma25.len(), 6);

    // Live trades: revise the open bar, then close it by opening three more
    let mut live = Vec::new();
    for (i, price) in [(30 * 60 - 10, 107.0), (31 * 60, 95.0), (32 * 60, 96.0), (33 * 60, 97.0)] {
        chart.on_trade(&trade("BTCUSDT", i, price));
        live.push(price);
    }

    let mut all = history;
    all.last_mut().unwrap().close = 107.0;
    for (k, price) in live[1..].iter().enumerate() {
        all.push(bar((31 + k as i64) * 60, *price, *price, *price, *price));
    }
    let closes: Vec<f64> = all.iter().map(|b| b.close).collect();

    for period in [7usize, 25] {
        let batch = quantboard::chart::sma(&closes, period);
        let drawn: Vec<f64> = chart
            .surface()
            .series(SeriesId::MovingAverage(period))
            .iter()
            .map(|p| match p {
                SeriesPoint::Line { value, .. } => *value,
                other => panic!("Expected line point, got {:?}", other),
            })
            .collect();
        // The open bar (t = 33m) has no point yet
        assert_eq!(drawn, batch[..batch.len() - 1].to_vec(), "period {}", period);
    }
}

#[tokio::test]
async fn test_store_feed_respects_delivery_order() {
    let store = PriceStore::with_limits(100, 10).shared();
    let mut chart = ChartRenderer::new(RecordingSurface::new(), "BTCUSDT", ChartConfig::default());
    chart.attach(&store).await;

    chart.load_history(&ScriptedSource::default()).await;

    {
        let mut guard = store.write().await;
        for t in [
            trade("BTCUSDT", 10, 1.0),
            trade("BTCUSDT", 70, 2.0),
            trade("BTCUSDT", 50, 9.0),
            trade("BTCUSDT", 80, 3.0),
        ] {
            guard.update_price(&t.symbol.clone(), t);
        }
    }

    assert_eq!(chart.drain(), 4);
    assert_eq!(
        candles(chart.surface()),
        vec![bar(0, 1.0, 1.0, 1.0, 1.0), bar(60, 2.0, 3.0, 2.0, 3.0)]
    );

    // The store keeps every trade even though the chart rejected one
    let data = store.read().await.get(&Symbol::new("BTCUSDT")).unwrap();
    assert_eq!(data.price_history.len(), 4);
    assert_eq!(data.current_price, 3.0);

    chart.detach(&store).await;
    assert_eq!(store.read().await.listener_count(), 0);
}

#[tokio::test]
async fn test_resize_forwarded_once_per_change() {
    let mut chart = ChartRenderer::new(RecordingSurface::new(), "BTCUSDT", ChartConfig::default());
    chart.on_resize(640, 480);
    chart.on_resize(640, 480);
    chart.on_resize(1280, 720);

    let resizes: Vec<&SurfaceCall> = chart
        .surface()
        .calls()
        .iter()
        .filter(|c| matches!(c, SurfaceCall::Resize(..)))
        .collect();
    assert_eq!(
        resizes,
        vec![&SurfaceCall::Resize(640, 480), &SurfaceCall::Resize(1280, 720)]
    );
}
