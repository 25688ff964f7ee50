//! Bar provider trait and structured error types.
//!
//! The DataProvider trait abstracts over bar sources so the backtest loader
//! can swap a network provider for the CSV cache or a test fixture.

use crate::domain::Bar;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

/// Structured error types for bar loading.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no cached bars for symbol '{symbol}' (offline mode)")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Source of daily bars.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV bars for a symbol over `[start, end]`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Bar>, DataError>;
}

/// Sort by date, keep the last bar per date, and drop void or inconsistent bars.
pub fn clean_bars(symbol: &str, mut bars: Vec<Bar>) -> Result<Vec<Bar>, DataError> {
    bars.sort_by_key(|b| b.date);
    // Keep the last occurrence of each date.
    bars.reverse();
    bars.dedup_by_key(|b| b.date);
    bars.reverse();

    let before = bars.len();
    bars.retain(Bar::is_sane);
    let dropped = before - bars.len();
    if dropped > 0 {
        warn!(symbol, dropped, "dropped void or inconsistent bars");
    }

    if bars.is_empty() {
        return Err(DataError::Validation(format!("no usable bars for {symbol}")));
    }
    Ok(bars)
}

/// Bars whose date lies in `[start, end]`.
pub fn slice_range(bars: &[Bar], start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    bars.iter()
        .filter(|b| b.date >= start && b.date <= end)
        .cloned()
        .collect()
}
