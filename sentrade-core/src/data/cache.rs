//! CSV bar cache.
//!
//! Layout: `{cache_dir}/bars/{SYMBOL}.csv` plus a `{SYMBOL}.meta.json` sidecar.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - The sidecar records the requested range and a BLAKE3 hash of the CSV
//! - Files whose hash no longer matches are quarantined (`.quarantined`)

use super::provider::DataError;
use crate::domain::Bar;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarCacheMeta {
    pub symbol: String,
    /// Range that was requested from the provider.
    pub requested_start: NaiveDate,
    pub requested_end: NaiveDate,
    pub first_bar: NaiveDate,
    pub last_bar: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

impl BarCacheMeta {
    /// Whether the cached download covers `[start, end]`.
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.requested_start <= start && self.requested_end >= end
    }
}

/// Daily bars persisted as one CSV per symbol.
pub struct BarCache {
    dir: PathBuf,
}

impl BarCache {
    /// Files are stored under `{cache_dir}/bars/`.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: cache_dir.as_ref().join("bars"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.meta.json"))
    }

    /// Write bars fetched for `[start, end]`, replacing any previous entry.
    pub fn write(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        bars: &[Bar],
        source: &str,
    ) -> Result<BarCacheMeta, DataError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::Cache("no bars to cache".into()));
        };

        fs::create_dir_all(&self.dir)
            .map_err(|e| DataError::Cache(format!("failed to create dir: {e}")))?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for bar in bars {
            writer
                .serialize(bar)
                .map_err(|e| DataError::Cache(format!("csv serialization: {e}")))?;
        }
        let content = writer
            .into_inner()
            .map_err(|e| DataError::Cache(format!("csv flush: {e}")))?;

        let meta = BarCacheMeta {
            symbol: symbol.to_string(),
            requested_start: start,
            requested_end: end,
            first_bar: first.date,
            last_bar: last.date,
            bar_count: bars.len(),
            data_hash: blake3::hash(&content).to_hex().to_string(),
            source: source.to_string(),
            cached_at: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Cache(format!("meta serialization: {e}")))?;

        atomic_write(&self.csv_path(symbol), &content)?;
        atomic_write(&self.meta_path(symbol), meta_json.as_bytes())?;
        Ok(meta)
    }

    /// Sidecar for a symbol, or `None` if not cached or unreadable.
    pub fn meta(&self, symbol: &str) -> Option<BarCacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Load every cached bar for a symbol, sorted by date.
    pub fn load(&self, symbol: &str) -> Result<Vec<Bar>, DataError> {
        let path = self.csv_path(symbol);
        let meta = self.meta(symbol);
        let (Some(meta), true) = (meta, path.exists()) else {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        };

        let content = fs::read(&path).map_err(|e| DataError::Cache(format!("read: {e}")))?;
        let hash = blake3::hash(&content).to_hex().to_string();
        if hash != meta.data_hash {
            warn!(symbol, path = %path.display(), "bar cache hash mismatch, quarantining");
            self.quarantine(symbol);
            return Err(DataError::Cache(format!(
                "hash mismatch for {symbol}; file quarantined"
            )));
        }

        let mut reader = csv::Reader::from_reader(content.as_slice());
        let mut bars = Vec::with_capacity(meta.bar_count);
        for record in reader.deserialize::<Bar>() {
            let bar = record.map_err(|e| DataError::Cache(format!("csv parse: {e}")))?;
            bars.push(bar);
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn quarantine(&self, symbol: &str) {
        let path = self.csv_path(symbol);
        let _ = fs::rename(&path, path.with_extension("csv.quarantined"));
        let _ = fs::remove_file(self.meta_path(symbol));
    }

    /// Sidecars of every cached symbol, sorted by symbol.
    pub fn list(&self) -> Result<Vec<BarCacheMeta>, DataError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut metas = Vec::new();
        let entries =
            fs::read_dir(&self.dir).map_err(|e| DataError::Cache(format!("read dir: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Cache(format!("dir entry: {e}")))?;
            let name = entry.file_name();
            let Some(symbol) = name.to_str().and_then(|n| n.strip_suffix(".meta.json")) else {
                continue;
            };
            if let Some(meta) = self.meta(symbol) {
                metas.push(meta);
            }
        }
        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(metas)
    }

    /// Remove every cached file. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize, DataError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        let entries =
            fs::read_dir(&self.dir).map_err(|e| DataError::Cache(format!("read dir: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Cache(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path)
                    .map_err(|e| DataError::Cache(format!("remove {}: {e}", path.display())))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn atomic_write(path: &Path, content: &[u8]) -> Result<(), DataError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| DataError::Cache(format!("temp file: {e}")))?;
    tmp.write_all(content)
        .map_err(|e| DataError::Cache(format!("write: {e}")))?;
    tmp.persist(path)
        .map(|_| ())
        .map_err(|e| DataError::Cache(format!("atomic rename failed: {}", e.error)))
}
