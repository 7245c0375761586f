//! Shared types used across the REST, streaming, store and chart modules.

pub mod types;

pub use types::{normalize_symbols, ConnectionState, Interval, Symbol, Trade};
