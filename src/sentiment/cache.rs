// =============================================================================
// Sentiment Cache — disk-backed, shared across cron invocations
// =============================================================================
//
// Each bot run is a separate process, so the per-source caches live in a JSON
// file rather than in memory.  Entries carry the signal and the time it was
// produced; each source decides its own freshness window (F&G 10 minutes,
// X 30 minutes).
//
// The in-memory map sits behind a `parking_lot::RwLock` because the sources
// are fetched concurrently within a cycle.
// =============================================================================

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Signal;

/// One cached source reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub signal: Signal,
    pub timestamp: DateTime<Utc>,
}

/// Thread-safe cache keyed by source name.
pub struct SentimentCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl SentimentCache {
    /// Open the cache at `path`.  A missing or corrupt file starts empty — a
    /// broken cache must never block a trading cycle.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "sentiment cache is corrupt — starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        debug!(path = %path.display(), entries = entries.len(), "sentiment cache opened");

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Return the cached signal for `source` if it is younger than `ttl`.
    pub fn get_fresh(&self, source: &str, ttl: Duration) -> Option<Signal> {
        let entries = self.entries.read();
        let entry = entries.get(source)?;

        let age = Utc::now().signed_duration_since(entry.timestamp);
        if age < ttl {
            debug!(source, age_secs = age.num_seconds(), "using cached sentiment signal");
            Some(entry.signal)
        } else {
            None
        }
    }

    /// Record a fresh reading for `source`.
    pub fn put(&self, source: &str, signal: Signal) {
        self.entries.write().insert(
            source.to_string(),
            CacheEntry {
                signal,
                timestamp: Utc::now(),
            },
        );
    }

    /// Persist the cache (atomic tmp + rename).
    pub fn save(&self) -> Result<()> {
        let entries = self.entries.read();
        let content =
            serde_json::to_string_pretty(&*entries).context("failed to serialise sentiment cache")?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp cache to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp cache to {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = entries.len(), "sentiment cache saved");
        Ok(())
    }
}

impl std::fmt::Debug for SentimentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentCache")
            .field("path", &self.path)
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SentimentCache::open(dir.path().join("cache.json"));
        assert!(cache.get_fresh("twitter", Duration::minutes(30)).is_none());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = SentimentCache::open(&path);
        assert!(cache.get_fresh("news", Duration::minutes(10)).is_none());
    }

    #[test]
    fn fresh_entries_are_returned() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SentimentCache::open(dir.path().join("cache.json"));

        cache.put("twitter", Signal::Bullish);
        assert_eq!(
            cache.get_fresh("twitter", Duration::minutes(30)),
            Some(Signal::Bullish)
        );
    }

    #[test]
    fn expired_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SentimentCache::open(dir.path().join("cache.json"));

        cache.put("twitter", Signal::Bearish);
        // Zero TTL: anything already written is stale.
        assert!(cache.get_fresh("twitter", Duration::zero()).is_none());
    }

    #[test]
    fn save_and_reopen_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = SentimentCache::open(&path);
        cache.put("fear_and_greed", Signal::Bullish);
        cache.put("twitter", Signal::Bearish);
        cache.save().unwrap();

        let reopened = SentimentCache::open(&path);
        assert_eq!(
            reopened.get_fresh("fear_and_greed", Duration::minutes(10)),
            Some(Signal::Bullish)
        );
        assert_eq!(
            reopened.get_fresh("twitter", Duration::minutes(30)),
            Some(Signal::Bearish)
        );
    }
}
