//! Live candle chart printed to the terminal.
//!
//! Run: cargo run --example live_chart -- BTCUSDT 1m
//!
//! Loads history over REST, then folds streamed trades into the open candle
//! and prints every closed bar with its moving averages.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use quantboard::prelude::*;
use tracing_subscriber::EnvFilter;

/// Prints closed candles instead of drawing them.
#[derive(Default)]
struct TerminalSurface {
    open: Option<OhlcvBar>,
    averages: HashMap<usize, f64>,
}

impl TerminalSurface {
    fn print_bar(&self, bar: &OhlcvBar) {
        let mut averages: Vec<_> = self.averages.iter().collect();
        averages.sort_by_key(|(period, _)| **period);
        let ma: Vec<String> = averages
            .into_iter()
            .map(|(period, value)| format!("MA{} {:.4}", period, value))
            .collect();
        println!(
            "{} o {:.4} h {:.4} l {:.4} c {:.4} v {:.4}  {}",
            chrono::DateTime::from_timestamp(bar.time, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| bar.time.to_string()),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            ma.join("  ")
        );
    }
}

impl ChartSurface for TerminalSurface {
    fn set_data(&mut self, series: SeriesId, points: Vec<SeriesPoint>) {
        match series {
            SeriesId::Candles => {
                println!("-- {} candles loaded", points.len());
                self.open = points.last().and_then(|p| match p {
                    SeriesPoint::Candle(bar) => Some(*bar),
                    _ => None,
                });
            }
            SeriesId::MovingAverage(period) => {
                if let Some(SeriesPoint::Line { value, .. }) = points.last() {
                    self.averages.insert(period, *value);
                }
            }
            SeriesId::Volume => {}
        }
    }

    fn update(&mut self, series: SeriesId, point: SeriesPoint) {
        match (series, point) {
            (SeriesId::Candles, SeriesPoint::Candle(bar)) => {
                if let Some(open) = self.open.filter(|open| open.time != bar.time) {
                    self.print_bar(&open);
                }
                self.open = Some(bar);
            }
            (SeriesId::MovingAverage(period), SeriesPoint::Line { value, .. }) => {
                self.averages.insert(period, value);
            }
            _ => {}
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        println!("-- viewport {}x{}", width, height);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quantboard=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let symbol = Symbol::new(args.next().unwrap_or_else(|| "BTCUSDT".to_string()));
    let interval: Interval = args.next().as_deref().unwrap_or("1m").parse()?;

    let mut config = SessionConfig::from_env()?;
    config.chart = config.chart.with_interval(interval);

    let mut session = MarketSession::new(config)?;
    session.start().await;
    session.stream().subscribe([symbol.as_str()]).await;

    let mut chart = session.open_chart(TerminalSurface::default(), symbol.clone()).await;
    chart.on_resize(120, 40);

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            // Keep the event channel drained; prices reach the chart through the store
            event = session.stream_mut().next() => {
                if event.is_none() {
                    break;
                }
            }
            _ = tick.tick() => {
                if let HistoryState::Failed(reason) = chart.history_state() {
                    println!("-- history failed ({}), retrying", reason);
                    chart.retry(session.api()).await;
                }
                chart.drain();
                if let Some(bar) = chart.current_candle() {
                    tracing::debug!("{} open candle close {:.4}", symbol, bar.close);
                }
            }
        }
    }

    chart.detach(session.store()).await;
    session.shutdown().await;
    Ok(())
}
