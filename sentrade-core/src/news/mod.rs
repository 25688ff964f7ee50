//! News retrieval.
//!
//! [`NewsSource`] abstracts over where headlines come from so the policy can
//! be driven by the Alpaca news API, the on-disk memo wrapping it, or a fake
//! in tests. The memo sits above the trait; sources don't know about it.

pub mod alpaca;
pub mod cache;

pub use alpaca::AlpacaNewsClient;
pub use cache::{CacheStatus, CachedNews};

use crate::domain::NewsEvent;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

/// Errors from news retrieval.
#[derive(Debug, Error)]
pub enum NewsError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("news API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("malformed news record: {0}")]
    Malformed(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("offline: no cached news for {symbol} {start}..{end}")]
    Offline {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// A source of dated news for a symbol.
pub trait NewsSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// News for `symbol` published within `[start, end]`, inclusive.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError>;
}

/// Format a date the way the retrieval boundary keys it.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl<T: NewsSource + ?Sized> NewsSource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        (**self).fetch(symbol, start, end)
    }
}

/// A source that never reaches the network. Behind [`CachedNews`] it serves
/// memoized windows only.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNews;

impl NewsSource for OfflineNews {
    fn name(&self) -> &str {
        "offline"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        Err(NewsError::Offline {
            symbol: symbol.to_string(),
            start,
            end,
        })
    }
}
