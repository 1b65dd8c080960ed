//! Runtime tunables.
//!
//! Product-chosen knobs with documented defaults, stored at
//! `~/.config/clubwatch/config.json`. A missing or malformed file falls
//! back to defaults; the engine never refuses to start over config.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config directory paths
const APP_NAME: &str = "clubwatch";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    /// Days without a full refresh before the scheduler requests one.
    #[serde(default = "default_staleness_threshold_days")]
    pub staleness_threshold_days: i64,

    /// How many past change reports the history ring retains.
    #[serde(default = "default_history_retention")]
    pub history_retention: usize,

    /// How many transfer records are kept per club.
    #[serde(default = "default_transfer_history_depth")]
    pub transfer_history_depth: usize,

    /// How many recent matches feed the formation log.
    #[serde(default = "default_formation_log_depth")]
    pub formation_log_depth: usize,

    /// Whether friendlies count towards formations and tactics.
    #[serde(default)]
    pub include_friendlies: bool,

    /// Minimum seconds between backfill attempts for one club, to avoid
    /// refetch storms on clubs that keep coming back incomplete.
    #[serde(default = "default_backfill_cooldown_secs")]
    pub backfill_cooldown_secs: i64,
}

fn default_staleness_threshold_days() -> i64 {
    3
}

fn default_history_retention() -> usize {
    10
}

fn default_transfer_history_depth() -> usize {
    10
}

fn default_formation_log_depth() -> usize {
    20
}

fn default_backfill_cooldown_secs() -> i64 {
    60
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            staleness_threshold_days: default_staleness_threshold_days(),
            history_retention: default_history_retention(),
            transfer_history_depth: default_transfer_history_depth(),
            formation_log_depth: default_formation_log_depth(),
            include_friendlies: false,
            backfill_cooldown_secs: default_backfill_cooldown_secs(),
        }
    }
}

impl Tunables {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Load, falling back to defaults on any failure.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(tunables) => tunables,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let tunables = Tunables::default();
        assert_eq!(tunables.staleness_threshold_days, 3);
        assert_eq!(tunables.history_retention, 10);
        assert_eq!(tunables.backfill_cooldown_secs, 60);
        assert!(!tunables.include_friendlies);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let tunables: Tunables = serde_json::from_str(r#"{"staleness_threshold_days": 7}"#).unwrap();
        assert_eq!(tunables.staleness_threshold_days, 7);
        assert_eq!(tunables.history_retention, 10);
    }
}
