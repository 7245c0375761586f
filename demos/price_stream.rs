//! Stream live prices for the default symbols plus any given on the command line.
//!
//! Run: cargo run --example price_stream -- SOLUSDT XRPUSDT
//!
//! Reads `QUANTBOARD_*` settings from the environment or a `.env` file.

use futures_util::StreamExt;
use quantboard::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quantboard=info")),
        )
        .init();

    let mut session = MarketSession::new(SessionConfig::from_env()?)?;
    println!("Streaming from {}", session.stream().url());

    session.start().await;
    let extra: Vec<String> = std::env::args().skip(1).collect();
    if !extra.is_empty() {
        session.stream().subscribe(extra).await;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = session.stream_mut().next() => {
                let Some(event) = event else { break };
                match event {
                    WsEvent::Price { symbol, trade } => {
                        let store = session.store().read().await;
                        match store.get(&symbol) {
                            Some(data) => println!(
                                "{:<10} {:>14.4}  chg {:>+8.2}%  hi {:.4}  lo {:.4}  vol {:.4}",
                                symbol,
                                trade.price,
                                data.change_percent_24h,
                                data.high_24h,
                                data.low_24h,
                                data.volume_24h
                            ),
                            None => println!("{:<10} {:>14.4}", symbol, trade.price),
                        }
                    }
                    WsEvent::Subscribed { symbols } => println!("+ {:?}", symbols),
                    WsEvent::Unsubscribed { symbols } => println!("- {:?}", symbols),
                    WsEvent::Reconnecting { attempt, delay_ms } => {
                        println!("reconnecting (attempt {}) in {}ms", attempt, delay_ms)
                    }
                    WsEvent::MaxReconnectReached => {
                        println!("gave up reconnecting");
                        break;
                    }
                    other => tracing::debug!("{:?}", other),
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
