//! On-disk memo for news lookups.
//!
//! Layout: `{cache_dir}/news/{blake3(symbol, start, end)}.json`
//!
//! - Keyed by exactly `(symbol, start, end)`; a hit never touches the inner source
//! - No expiry; entries survive restarts
//! - Atomic writes (write to .tmp, rename into place)
//! - Corrupt entries are quarantined (`.quarantined`) and refetched

use super::{date_key, NewsError, NewsSource};
use crate::domain::NewsEvent;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// One memoized lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    symbol: String,
    start: String,
    end: String,
    source: String,
    fetched_at: DateTime<Utc>,
    events: Vec<NewsEvent>,
}

/// Summary of what the memo holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStatus {
    pub entries: usize,
    pub events: usize,
    pub bytes: u64,
    /// Entry count per symbol.
    pub symbols: BTreeMap<String, usize>,
}

/// A [`NewsSource`] that memoizes another one on disk.
pub struct CachedNews<S> {
    inner: S,
    dir: PathBuf,
}

impl<S: NewsSource> CachedNews<S> {
    /// Entries are stored under `{cache_dir}/news/`.
    pub fn new(inner: S, cache_dir: impl AsRef<Path>) -> Self {
        Self {
            inner,
            dir: cache_dir.as_ref().join("news"),
        }
    }

    /// Directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn key(symbol: &str, start: &str, end: &str) -> String {
        let canonical = serde_json::json!({
            "symbol": symbol,
            "start": start,
            "end": end,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }

    fn entry_path(&self, symbol: &str, start: &str, end: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(symbol, start, end)))
    }

    /// Read an entry; `None` on miss. Corrupt files are quarantined.
    fn read_entry(&self, path: &Path, symbol: &str, start: &str, end: &str) -> Option<CacheEntry> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) if entry.symbol == symbol && entry.start == start && entry.end == end => {
                Some(entry)
            }
            Ok(_) => {
                warn!(path = %path.display(), "news cache entry key mismatch, quarantining");
                quarantine(path);
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt news cache entry, quarantining");
                quarantine(path);
                None
            }
        }
    }

    fn write_entry(&self, path: &Path, entry: &CacheEntry) -> Result<(), NewsError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| NewsError::Cache(format!("failed to create dir: {e}")))?;

        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| NewsError::Cache(format!("entry serialization: {e}")))?;
        // One temp file per writer: concurrent misses on a key must not share it.
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| NewsError::Cache(format!("temp file: {e}")))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| NewsError::Cache(format!("entry write: {e}")))?;

        match tmp.persist(path) {
            Ok(_) => Ok(()),
            // Another writer for the same key landed first; its entry serves.
            Err(_) if path.is_file() => Ok(()),
            Err(e) => Err(NewsError::Cache(format!("atomic rename failed: {}", e.error))),
        }
    }

    /// Count entries, events and bytes per symbol.
    pub fn status(&self) -> Result<CacheStatus, NewsError> {
        let mut status = CacheStatus::default();
        if !self.dir.exists() {
            return Ok(status);
        }

        let entries =
            fs::read_dir(&self.dir).map_err(|e| NewsError::Cache(format!("read dir: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| NewsError::Cache(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(cached) = serde_json::from_str::<CacheEntry>(&content) else {
                continue;
            };
            status.entries += 1;
            status.events += cached.events.len();
            status.bytes += content.len() as u64;
            *status.symbols.entry(cached.symbol).or_default() += 1;
        }
        Ok(status)
    }

    /// Remove every entry. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize, NewsError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        let entries =
            fs::read_dir(&self.dir).map_err(|e| NewsError::Cache(format!("read dir: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| NewsError::Cache(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path)
                    .map_err(|e| NewsError::Cache(format!("remove {}: {e}", path.display())))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn quarantine(path: &Path) {
    let _ = fs::rename(path, path.with_extension("json.quarantined"));
}

impl<S: NewsSource> NewsSource for CachedNews<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        let start_key = date_key(start);
        let end_key = date_key(end);
        let path = self.entry_path(symbol, &start_key, &end_key);

        if let Some(entry) = self.read_entry(&path, symbol, &start_key, &end_key) {
            debug!(symbol, start = %start_key, end = %end_key, "news cache hit");
            return Ok(entry.events);
        }

        let events = self.inner.fetch(symbol, start, end)?;
        let entry = CacheEntry {
            symbol: symbol.to_string(),
            start: start_key,
            end: end_key,
            source: self.inner.name().to_string(),
            fetched_at: Utc::now(),
            events,
        };
        self.write_entry(&path, &entry)?;
        Ok(entry.events)
    }
}
