//! Daily bar loading and caching for backtests.

pub mod cache;
pub mod provider;
pub mod yahoo;

pub use cache::{BarCache, BarCacheMeta};
pub use provider::{clean_bars, slice_range, DataError, DataProvider};
pub use yahoo::YahooProvider;
