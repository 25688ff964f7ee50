//! Bar loading for the backtest host.
//!
//! Implements the fallback policy for one symbol:
//! 1. If the CSV cache covers the requested range → use it
//! 2. If not and a provider is available → download, clean, and cache
//! 3. Otherwise → fail with a clear error

use chrono::NaiveDate;
use sentrade_core::data::{clean_bars, slice_range, BarCache, DataError, DataProvider};
use sentrade_core::domain::Bar;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached bars for '{symbol}' and no network access (drop --offline to download)")]
    NoCachedDataOffline { symbol: String },

    #[error("no cached bars for '{symbol}' and download failed: {reason}")]
    DownloadFailed { symbol: String, reason: String },

    #[error("no bars for '{symbol}' between {start} and {end}")]
    EmptyRange {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Re-download even if cached.
    pub force: bool,
}

/// Where the bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarSource {
    Cache,
    Download,
}

/// Bars for one symbol plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub source: BarSource,
    /// BLAKE3 over every bar, for run fingerprints.
    pub dataset_hash: String,
}

/// Load bars for `symbol` over `[opts.start, opts.end]`.
pub fn load_bars(
    symbol: &str,
    cache: &BarCache,
    provider: Option<&dyn DataProvider>,
    opts: &LoadOptions,
) -> Result<LoadedBars, LoadError> {
    let cached = if opts.force {
        None
    } else {
        load_cached(symbol, cache, opts)
    };

    let (all_bars, source) = match cached {
        Some(bars) => (bars, BarSource::Cache),
        None if opts.offline => {
            return Err(LoadError::NoCachedDataOffline {
                symbol: symbol.to_string(),
            })
        }
        None => {
            let Some(provider) = provider else {
                return Err(LoadError::DownloadFailed {
                    symbol: symbol.to_string(),
                    reason: "no data provider configured".into(),
                });
            };
            let fetched = provider
                .fetch(symbol, opts.start, opts.end)
                .map_err(|e| LoadError::DownloadFailed {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                })?;
            let cleaned = clean_bars(symbol, fetched)?;
            cache.write(symbol, opts.start, opts.end, &cleaned, provider.name())?;
            info!(symbol, bars = cleaned.len(), provider = provider.name(), "downloaded and cached bars");
            (cleaned, BarSource::Download)
        }
    };

    let bars = slice_range(&all_bars, opts.start, opts.end);
    if bars.is_empty() {
        return Err(LoadError::EmptyRange {
            symbol: symbol.to_string(),
            start: opts.start,
            end: opts.end,
        });
    }

    Ok(LoadedBars {
        symbol: symbol.to_string(),
        dataset_hash: dataset_hash(symbol, &bars),
        bars,
        source,
    })
}

/// Cached bars if the cache covers the range; corrupt entries count as a miss.
fn load_cached(symbol: &str, cache: &BarCache, opts: &LoadOptions) -> Option<Vec<Bar>> {
    let meta = cache.meta(symbol)?;
    if !meta.covers(opts.start, opts.end) {
        return None;
    }
    match cache.load(symbol) {
        Ok(bars) => Some(bars),
        Err(e) => {
            warn!(symbol, error = %e, "bar cache unusable, refetching");
            None
        }
    }
}

/// Deterministic BLAKE3 hash over a symbol's bars.
pub fn dataset_hash(symbol: &str, bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
