//! Network URL constants and helpers for the Quantboard SDK.

use crate::shared::Symbol;

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Path of the multi-symbol price stream on the gateway.
pub const PRICE_STREAM_PATH: &str = "/ws/prices";

/// Derive the streaming scheme from an API base URL: `https`/`wss` become
/// `wss`, everything else becomes `ws`. Returns the scheme and the rest of
/// the URL after `://` (or the whole input when it has no scheme).
fn split_stream_scheme(base_url: &str) -> (&'static str, &str) {
    match base_url.split_once("://") {
        Some((scheme, rest)) => {
            let secure = scheme.eq_ignore_ascii_case("https") || scheme.eq_ignore_ascii_case("wss");
            (if secure { "wss" } else { "ws" }, rest)
        }
        None => ("ws", base_url),
    }
}

/// Build the price stream URL for an API base URL and an initial symbol set.
///
/// `https://api.example.com` with `[BTCUSDT, ETHUSDT]` becomes
/// `wss://api.example.com/ws/prices?symbols=BTCUSDT,ETHUSDT`. The query is
/// omitted when `symbols` is empty, letting the gateway apply its defaults.
pub fn stream_url(base_url: &str, symbols: &[Symbol]) -> String {
    let (scheme, rest) = split_stream_scheme(base_url.trim());
    let host = rest.trim_end_matches('/');

    let mut url = format!("{}://{}{}", scheme, host, PRICE_STREAM_PATH);
    if !symbols.is_empty() {
        let joined = symbols
            .iter()
            .map(|s| urlencoding::encode(s.as_str()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        url.push_str(&format!("?symbols={}", joined));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(raw: &[&str]) -> Vec<Symbol> {
        raw.iter().map(|s| Symbol::new(*s)).collect()
    }

    #[test]
    fn test_stream_url_secure() {
        let url = stream_url("https://api.example.com/", &symbols(&["btcusdt", "ethusdt"]));
        assert_eq!(url, "wss://api.example.com/ws/prices?symbols=BTCUSDT,ETHUSDT");
    }

    #[test]
    fn test_stream_url_plain() {
        let url = stream_url("http://127.0.0.1:8000", &symbols(&["BTCUSDT"]));
        assert_eq!(url, "ws://127.0.0.1:8000/ws/prices?symbols=BTCUSDT");
    }

    #[test]
    fn test_stream_url_without_symbols() {
        assert_eq!(stream_url("http://localhost:8000", &[]), "ws://localhost:8000/ws/prices");
    }

    #[test]
    fn test_stream_url_keeps_stream_schemes() {
        assert!(stream_url("wss://gw.example.com", &[]).starts_with("wss://"));
        assert!(stream_url("ws://gw.example.com", &[]).starts_with("ws://"));
        assert!(stream_url("gw.example.com", &[]).starts_with("ws://gw.example.com"));
    }
}
