//! Shared type definitions for the Quantboard SDK.
//!
//! This module contains types that are used by the REST API, the streaming
//! client, the price store and the chart layer.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Symbol
// ============================================================================

/// Trading pair identifier (e.g. `"BTCUSDT"`).
///
/// Construction trims surrounding whitespace and upper-cases the input, so
/// `Symbol::new(" btcusdt ")` and `Symbol::new("BTCUSDT")` compare equal.
/// Serializes transparently as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalize a batch of raw symbol strings: casing is fixed, blanks are
/// dropped and duplicates removed while keeping first-seen order.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<Symbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<Symbol> = Vec::new();
    for raw in symbols {
        let symbol = Symbol::new(raw);
        if !symbol.is_empty() && !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&Symbol> for Symbol {
    fn from(s: &Symbol) -> Self {
        s.clone()
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Symbol::new(s))
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Symbol::new(s))
    }
}

// ============================================================================
// Interval Enum (shared between API and chart)
// ============================================================================

/// Candle interval.
///
/// Wire strings match what the candles endpoint accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    /// Calendar month, bucketed as a fixed 30 days.
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    pub const ALL: [Interval; 15] = [
        Self::OneMinute,
        Self::ThreeMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::FourHours,
        Self::SixHours,
        Self::EightHours,
        Self::TwelveHours,
        Self::OneDay,
        Self::ThreeDays,
        Self::OneWeek,
        Self::OneMonth,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::SixHours => "6h",
            Self::EightHours => "8h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1M",
        }
    }

    /// Bucket length in seconds.
    pub fn as_secs(&self) -> i64 {
        const MINUTE: i64 = 60;
        const HOUR: i64 = 60 * MINUTE;
        const DAY: i64 = 24 * HOUR;
        match self {
            Self::OneMinute => MINUTE,
            Self::ThreeMinutes => 3 * MINUTE,
            Self::FiveMinutes => 5 * MINUTE,
            Self::FifteenMinutes => 15 * MINUTE,
            Self::ThirtyMinutes => 30 * MINUTE,
            Self::OneHour => HOUR,
            Self::TwoHours => 2 * HOUR,
            Self::FourHours => 4 * HOUR,
            Self::SixHours => 6 * HOUR,
            Self::EightHours => 8 * HOUR,
            Self::TwelveHours => 12 * HOUR,
            Self::OneDay => DAY,
            Self::ThreeDays => 3 * DAY,
            Self::OneWeek => 7 * DAY,
            Self::OneMonth => 30 * DAY,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| format!("Unsupported interval: {}", s))
    }
}

// ============================================================================
// Trade
// ============================================================================

/// One executed trade as delivered by the price stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub price: f64,
    pub quantity: f64,
    /// Exchange timestamp in milliseconds
    pub timestamp: i64,
    pub trade_id: i64,
    pub is_buyer_maker: bool,
}

impl Trade {
    /// Trade time in whole seconds (floor).
    pub fn time_secs(&self) -> i64 {
        self.timestamp.div_euclid(1000)
    }
}

// ============================================================================
// Connection state
// ============================================================================

/// Streaming connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

impl From<ConnectionState> for u8 {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Error => 3,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::new(" btcusdt "), Symbol::new("BTCUSDT"));
        assert_eq!(Symbol::new("ethUsdt").as_str(), "ETHUSDT");
    }

    #[test]
    fn test_normalize_symbols_dedupes_in_order() {
        let symbols = normalize_symbols(["ethusdt", "BTCUSDT", " ETHUSDT", ""]);
        assert_eq!(symbols, vec![Symbol::new("ETHUSDT"), Symbol::new("BTCUSDT")]);
    }

    #[test]
    fn test_symbol_serde_is_transparent() {
        let json = serde_json::to_string(&Symbol::new("solusdt")).unwrap();
        assert_eq!(json, "\"SOLUSDT\"");

        let symbol: Symbol = serde_json::from_str("\"dogeusdt\"").unwrap();
        assert_eq!(symbol.as_str(), "DOGEUSDT");
    }

    #[test]
    fn test_interval_round_trip_and_secs() {
        for interval in Interval::ALL {
            assert_eq!(interval.as_str().parse::<Interval>().unwrap(), interval);
        }
        assert_eq!(Interval::OneMinute.as_secs(), 60);
        assert_eq!(Interval::FourHours.as_secs(), 14_400);
        assert_eq!(Interval::OneWeek.as_secs(), 604_800);
        assert!("2m".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_month_is_case_sensitive() {
        assert_eq!("1M".parse::<Interval>().unwrap(), Interval::OneMonth);
        assert_eq!("1m".parse::<Interval>().unwrap(), Interval::OneMinute);
    }

    #[test]
    fn test_trade_time_secs_floors() {
        let trade = Trade {
            symbol: Symbol::new("BTCUSDT"),
            price: 1.0,
            quantity: 1.0,
            timestamp: 65_999,
            trade_id: 1,
            is_buyer_maker: false,
        };
        assert_eq!(trade.time_secs(), 65);
    }

    #[test]
    fn test_connection_state_u8_round_trip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Error,
        ] {
            assert_eq!(ConnectionState::from(u8::from(state)), state);
        }
    }
}
