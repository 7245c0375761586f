//! Price state containers.

pub mod history;
pub mod price;

pub use history::TradeHistory;
pub use price::{ListenerId, PriceStore, SharedPriceStore, StoreEvent, SymbolPriceData};
