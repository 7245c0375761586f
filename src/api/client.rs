//! Quantboard REST API client implementation.
//!
//! The [`QuantboardApiClient`] fetches historical candles and symbol metadata
//! from the gateway's REST surface.
//!
//! # Example
//!
//! ```rust,ignore
//! use quantboard::api::{CandlesParams, QuantboardApiClient};
//! use quantboard::shared::Interval;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = QuantboardApiClient::new("http://localhost:8000")?;
//!
//!     let params = CandlesParams::new("BTCUSDT", Interval::OneMinute).with_limit(200);
//!     let resp = client.get_candles(params).await?;
//!     println!("{} candles for {}", resp.candles.len(), resp.symbol);
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::chart::{CandleSource, OhlcvBar};
use crate::registry::SymbolInfo;
use crate::shared::Symbol;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of candles the gateway returns per request.
pub const MAX_CANDLES_LIMIT: u32 = 1000;

/// How often and how patiently to repeat a request that failed transiently.
///
/// Only errors where [`ApiError::is_transient`] holds are retried. Retries
/// are off unless enabled through [`QuantboardApiClientBuilder::with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = disabled)
    pub max_retries: u32,
    /// Delay before the first retry (ms); doubles per retry
    pub base_delay_ms: u64,
    /// Upper bound on any one delay (ms)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Delay before retry number `retry` (zero-based), scaled to 75-100%.
    fn backoff(&self, retry: u32) -> Duration {
        let nominal = self
            .base_delay_ms
            .saturating_mul(1u64 << retry.min(10))
            .min(self.max_delay_ms);
        let scale = rand::thread_rng().gen_range(0.75..=1.0);
        Duration::from_millis((nominal as f64 * scale) as u64)
    }
}

/// Builder for [`QuantboardApiClient`].
#[derive(Debug, Clone)]
pub struct QuantboardApiClientBuilder {
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl QuantboardApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    /// Per-request timeout, covering connect through body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry transient failures with exponential backoff.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> ApiResult<QuantboardApiClient> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()?;

        Ok(QuantboardApiClient {
            http,
            base_url: self.base_url,
            retry: self.retry,
        })
    }
}

/// Quantboard REST API client.
#[derive(Debug, Clone)]
pub struct QuantboardApiClient {
    http: Client,
    base_url: String,
    retry: RetryConfig,
}

impl QuantboardApiClient {
    /// Client with the default timeout and no retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        QuantboardApiClientBuilder::new(base_url).build()
    }

    pub fn builder(base_url: impl Into<String>) -> QuantboardApiClientBuilder {
        QuantboardApiClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// GET `url` and decode the JSON body, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let mut retry = 0;
        loop {
            match self.get_once(url).await {
                Err(e) if e.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.backoff(retry);
                    retry += 1;
                    tracing::debug!(
                        "GET {} failed ({}), retry {}/{} in {}ms",
                        url,
                        e,
                        retry,
                        self.retry.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::from_response(status, &String::from_utf8_lossy(&body)));
        }
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::Deserialize(format!("{} from {}: {}", status, url, e)))
    }

    fn check_limit(limit: u32) -> ApiResult<()> {
        if !(1..=MAX_CANDLES_LIMIT).contains(&limit) {
            return Err(ApiError::InvalidParameter(format!(
                "limit must be 1-{}, got {}",
                MAX_CANDLES_LIMIT, limit
            )));
        }
        Ok(())
    }

    fn check_symbol(symbol: &Symbol) -> ApiResult<()> {
        if symbol.is_empty() {
            return Err(ApiError::InvalidParameter("symbol cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Build the candles URL after validating the parameters.
    pub(crate) fn candles_url(&self, params: &CandlesParams) -> ApiResult<String> {
        Self::check_symbol(&params.symbol)?;
        if let Some(limit) = params.limit {
            Self::check_limit(limit)?;
        }

        let mut url = format!(
            "{}/api/candles?symbol={}&interval={}",
            self.base_url,
            urlencoding::encode(params.symbol.as_str()),
            urlencoding::encode(params.interval.as_str())
        );

        if let Some(limit) = params.limit {
            url.push_str(&format!("&limit={}", limit));
        }
        if let Some(end_time) = params.end_time {
            url.push_str(&format!("&end_time={}", end_time));
        }

        Ok(url)
    }

    // =========================================================================
    // Candle endpoints
    // =========================================================================

    /// Get historical OHLCV candles, ascending by time.
    ///
    /// `limit` must be 1-1000 when given; the gateway defaults to 500.
    pub async fn get_candles(&self, params: CandlesParams) -> ApiResult<CandlesResponse> {
        let url = self.candles_url(&params)?;
        self.get_json(&url).await
    }

    // =========================================================================
    // Symbol endpoints
    // =========================================================================

    /// Get the supported symbol list and the default symbols.
    pub async fn get_supported_symbols(&self) -> ApiResult<SupportedSymbolsResponse> {
        let url = format!("{}/api/symbols", self.base_url);
        self.get_json(&url).await
    }

    /// Get metadata for one symbol.
    ///
    /// The gateway derives metadata for symbols outside its supported list
    /// instead of returning 404.
    pub async fn get_symbol_info(&self, symbol: impl Into<Symbol>) -> ApiResult<SymbolInfo> {
        let symbol = symbol.into();
        Self::check_symbol(&symbol)?;
        let url = format!(
            "{}/api/symbols/{}",
            self.base_url,
            urlencoding::encode(symbol.as_str())
        );
        self.get_json(&url).await
    }
}

impl CandleSource for QuantboardApiClient {
    type Error = ApiError;

    async fn fetch_candles(&self, params: CandlesParams) -> Result<Vec<OhlcvBar>, ApiError> {
        self.get_candles(params).await.map(|resp| resp.candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Interval;

    #[test]
    fn test_client_creation() {
        let client = QuantboardApiClient::new("http://localhost:8000").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_client_builder() {
        let client = QuantboardApiClient::builder("https://api.quantboard.io/")
            .timeout(Duration::from_secs(60))
            .with_retry(RetryConfig::new(2))
            .build()
            .unwrap();

        assert_eq!(client.base_url(), "https://api.quantboard.io");
        assert_eq!(client.retry.max_retries, 2);
    }

    #[test]
    fn test_candles_url() {
        let client = QuantboardApiClient::new("http://localhost:8000").unwrap();

        let params = CandlesParams::new("ethusdt", Interval::FifteenMinutes);
        assert_eq!(
            client.candles_url(&params).unwrap(),
            "http://localhost:8000/api/candles?symbol=ETHUSDT&interval=15m"
        );

        let params = CandlesParams::new("BTCUSDT", Interval::OneMonth)
            .with_limit(100)
            .with_end_time(1_700_000_000_000);
        assert_eq!(
            client.candles_url(&params).unwrap(),
            "http://localhost:8000/api/candles?symbol=BTCUSDT&interval=1M&limit=100&end_time=1700000000000"
        );
    }

    #[test]
    fn test_candles_limit_validation() {
        let client = QuantboardApiClient::new("http://localhost:8000").unwrap();

        for limit in [0, 1001] {
            let params = CandlesParams::new("BTCUSDT", Interval::OneMinute).with_limit(limit);
            assert!(matches!(
                client.candles_url(&params),
                Err(ApiError::InvalidParameter(_))
            ));
        }

        let params = CandlesParams::new("BTCUSDT", Interval::OneMinute).with_limit(1000);
        assert!(client.candles_url(&params).is_ok());
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let client = QuantboardApiClient::new("http://localhost:8000").unwrap();
        let params = CandlesParams::new("  ", Interval::OneMinute);
        assert!(matches!(
            client.candles_url(&params),
            Err(ApiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_retry_backoff_bounds() {
        let config = RetryConfig::new(3)
            .with_base_delay_ms(200)
            .with_max_delay_ms(5000);

        for _ in 0..50 {
            let first = config.backoff(0).as_millis();
            assert!((150..=200).contains(&first), "{}", first);
            let capped = config.backoff(10).as_millis();
            assert!((3750..=5000).contains(&capped), "{}", capped);
        }
    }
}
