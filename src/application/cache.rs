//! Filesystem-backed key-value cache for computed indicator frames, keyed
//! by `(ticker, start, end)`. Writers go through a temp-file-then-rename so
//! a concurrent reader never observes a partially written file; readers
//! tolerate a missing or unreadable entry by treating it as a cache miss.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::bar::Bar;

fn cache_key(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{ticker}_{start}_{end}.bin")
}

/// The raw bar history persisted per `(ticker, start, end)` key. Caching the
/// bars themselves (rather than the derived indicator frame) lets the loader
/// reuse a cache hit across an `IndicatorParams` change without rebuilding
/// the file, and skips re-fetching over the network on the common path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedBars {
    pub ticker: String,
    pub bars: Vec<Bar>,
}

pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        self.root.join(cache_key(ticker, start, end))
    }

    /// Looks up an exact `(ticker, start, end)` match. Any failure to read
    /// or deserialize is treated as a miss, never an error: a stale or
    /// corrupt cache entry should simply trigger a recompute.
    pub fn get(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Option<CachedBars> {
        let path = self.path_for(ticker, start, end);
        let bytes = fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Writes the bar history atomically: serialize to a temp file in the
    /// same directory, then rename over the final path. Rename is atomic on
    /// the same filesystem, so concurrent readers see either the old or the
    /// new content, never a partial write.
    pub fn put(&self, ticker: &str, start: NaiveDate, end: NaiveDate, bars: &[Bar]) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)?;
        let payload = CachedBars { ticker: ticker.to_string(), bars: bars.to_vec() };
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        let final_path = self.path_for(ticker, start, end);
        let tmp_path = final_path.with_extension("bin.tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}
