//! Session context.
//!
//! A [`MarketSession`] owns everything one application session needs: the
//! symbol registry, the shared price store, the streaming client and the
//! REST client. Components receive what they need from it; nothing lives in
//! globals.

use crate::chart::{ChartConfig, ChartRenderer, ChartSurface};
use crate::error::{SdkError, SdkResult};
use crate::network::DEFAULT_API_URL;
use crate::registry::SymbolRegistry;
use crate::shared::{normalize_symbols, Symbol};
use crate::state::{PriceStore, SharedPriceStore};
use crate::websocket::{MarketStreamClient, WebSocketConfig};

#[cfg(feature = "api")]
use crate::api::QuantboardApiClient;

pub const ENV_API_URL: &str = "QUANTBOARD_API_URL";
pub const ENV_HISTORY_LIMIT: &str = "QUANTBOARD_HISTORY_LIMIT";
pub const ENV_MAX_SUBSCRIPTIONS: &str = "QUANTBOARD_MAX_SUBSCRIPTIONS";
pub const ENV_DEFAULT_SYMBOLS: &str = "QUANTBOARD_DEFAULT_SYMBOLS";

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// REST base URL; the stream URL is derived from it
    pub api_url: String,
    pub registry: SymbolRegistry,
    pub websocket: WebSocketConfig,
    pub chart: ChartConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            registry: SymbolRegistry::default(),
            websocket: WebSocketConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Read overrides from `QUANTBOARD_*` environment variables.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> SdkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_API_URL) {
            config.api_url = url.trim().to_string();
        }

        let mut registry = SymbolRegistry::default();
        if let Some(raw) = get(ENV_HISTORY_LIMIT) {
            registry = registry.with_history_limit(parse_positive(ENV_HISTORY_LIMIT, &raw)?);
        }
        if let Some(raw) = get(ENV_MAX_SUBSCRIPTIONS) {
            registry = registry.with_max_subscriptions(parse_positive(ENV_MAX_SUBSCRIPTIONS, &raw)?);
        }
        if let Some(raw) = get(ENV_DEFAULT_SYMBOLS) {
            let symbols = normalize_symbols(raw.split(','));
            if symbols.is_empty() {
                return Err(SdkError::Config(format!("{} has no symbols", ENV_DEFAULT_SYMBOLS)));
            }
            registry = registry.with_default_symbols(symbols);
        }
        config.registry = registry;

        Ok(config)
    }
}

fn parse_positive(key: &str, raw: &str) -> SdkResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SdkError::Config(format!(
            "{} must be a positive integer, got {:?}",
            key, raw
        ))),
    }
}

/// One application session.
pub struct MarketSession {
    config: SessionConfig,
    store: SharedPriceStore,
    stream: MarketStreamClient,
    #[cfg(feature = "api")]
    api: QuantboardApiClient,
}

impl MarketSession {
    /// Construct the session. Nothing connects until [`start`](Self::start).
    pub fn new(config: SessionConfig) -> SdkResult<Self> {
        let store = PriceStore::new(&config.registry).shared();
        let stream = MarketStreamClient::new(
            &config.api_url,
            &config.registry,
            store.clone(),
            config.websocket.clone(),
        );

        #[cfg(feature = "api")]
        let api = QuantboardApiClient::new(config.api_url.clone())?;

        Ok(Self {
            config,
            store,
            stream,
            #[cfg(feature = "api")]
            api,
        })
    }

    /// Open the price stream.
    pub async fn start(&mut self) {
        tracing::info!("Starting market session against {}", self.config.api_url);
        self.stream.connect().await;
    }

    /// Close the stream and drop all price state.
    pub async fn shutdown(&mut self) {
        self.stream.disconnect().await;
        self.store.write().await.clear_all_history();
        tracing::info!("Market session shut down");
    }

    /// A chart for `symbol` using the session's chart settings. Not yet
    /// attached or loaded.
    pub fn chart<S: ChartSurface>(&self, surface: S, symbol: impl Into<Symbol>) -> ChartRenderer<S> {
        ChartRenderer::new(surface, symbol, self.config.chart.clone())
    }

    /// A chart attached to the session store with history loaded (or
    /// failed, see [`ChartRenderer::history_state`]).
    #[cfg(feature = "api")]
    pub async fn open_chart<S: ChartSurface>(
        &self,
        surface: S,
        symbol: impl Into<Symbol>,
    ) -> ChartRenderer<S> {
        let mut chart = self.chart(surface, symbol);
        chart.attach(&self.store).await;
        chart.load_history(&self.api).await;
        chart
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.config.registry
    }

    pub fn store(&self) -> &SharedPriceStore {
        &self.store
    }

    pub fn stream(&self) -> &MarketStreamClient {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut MarketStreamClient {
        &mut self.stream
    }

    #[cfg(feature = "api")]
    pub fn api(&self) -> &QuantboardApiClient {
        &self.api
    }
}
