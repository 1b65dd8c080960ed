//! JSON file persistence for engine state.
//!
//! Each persisted structure (cache, baseline, history, refresh marker)
//! lives in its own file and is loaded independently: a malformed or
//! missing file falls back to its default instead of failing startup.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::store::TeamCache;
use crate::history::UpdateHistory;

const CACHE_FILE: &str = "cache";
const BASELINE_FILE: &str = "baseline";
const HISTORY_FILE: &str = "history";
const REFRESH_MARKER_FILE: &str = "last_refresh";

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    /// Default location under the platform cache directory.
    pub fn default_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join("clubwatch"))
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", name))?;

        let parsed: T = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", name))?;

        Ok(Some(parsed))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let path = self.file_path(name);
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write state file: {}", name))?;
        Ok(())
    }

    /// Load one structure, falling back to its default on any failure.
    fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        match self.load(name) {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(file = name, "No persisted state, starting empty");
                T::default()
            }
            Err(e) => {
                warn!(file = name, error = %e, "Discarding malformed persisted state");
                T::default()
            }
        }
    }

    // ===== Snapshot cache =====

    pub fn load_cache(&self) -> TeamCache {
        self.load_or_default(CACHE_FILE)
    }

    pub fn save_cache(&self, cache: &TeamCache) -> Result<()> {
        self.save(CACHE_FILE, cache)
    }

    // ===== Review baseline =====

    pub fn load_baseline(&self) -> TeamCache {
        self.load_or_default(BASELINE_FILE)
    }

    pub fn save_baseline(&self, baseline: &TeamCache) -> Result<()> {
        self.save(BASELINE_FILE, baseline)
    }

    // ===== Update history =====

    pub fn load_history(&self) -> UpdateHistory {
        self.load_or_default(HISTORY_FILE)
    }

    pub fn save_history(&self, history: &UpdateHistory) -> Result<()> {
        self.save(HISTORY_FILE, history)
    }

    // ===== Last full refresh marker =====

    pub fn load_refresh_marker(&self) -> Option<DateTime<Utc>> {
        match self.load(REFRESH_MARKER_FILE) {
            Ok(marker) => marker,
            Err(e) => {
                warn!(error = %e, "Discarding malformed refresh marker");
                None
            }
        }
    }

    pub fn save_refresh_marker(&self, at: DateTime<Utc>) -> Result<()> {
        self.save(REFRESH_MARKER_FILE, &at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CategoryValue;
    use crate::models::{FanClubReport, TrackedClub};
    use chrono::TimeZone;

    fn manager() -> (tempfile::TempDir, CacheManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(dir.path().to_path_buf()).unwrap();
        (dir, manager)
    }

    #[test]
    fn cache_round_trips() {
        let (_dir, manager) = manager();

        let mut cache = TeamCache::default();
        cache.commit_category(
            &TrackedClub::new(7, "Club 7"),
            CategoryValue::FanClub(FanClubReport {
                name: Some("Ultras".to_string()),
                members: 250,
            }),
            Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
        );

        manager.save_cache(&cache).unwrap();
        assert_eq!(manager.load_cache(), cache);
    }

    #[test]
    fn missing_files_load_as_defaults() {
        let (_dir, manager) = manager();
        assert_eq!(manager.load_cache(), TeamCache::default());
        assert!(manager.load_history().is_empty());
        assert!(manager.load_refresh_marker().is_none());
    }

    #[test]
    fn malformed_files_load_as_defaults() {
        let (dir, manager) = manager();
        for name in ["cache", "baseline", "history", "last_refresh"] {
            std::fs::write(dir.path().join(format!("{}.json", name)), "{not json").unwrap();
        }

        assert_eq!(manager.load_cache(), TeamCache::default());
        assert_eq!(manager.load_baseline(), TeamCache::default());
        assert!(manager.load_history().is_empty());
        assert!(manager.load_refresh_marker().is_none());
    }

    #[test]
    fn refresh_marker_round_trips() {
        let (_dir, manager) = manager();
        let at = Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap();
        manager.save_refresh_marker(at).unwrap();
        assert_eq!(manager.load_refresh_marker(), Some(at));
    }
}
