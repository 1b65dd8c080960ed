//! Bounded, newest-first history of past comparisons.
//!
//! Only comparisons that actually found changes occupy a ring entry; a
//! "no changes" comparison just bumps the last-compared marker, so quiet
//! days never push meaningful reports out of retention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::DiffResult;

/// Default number of past change reports kept around.
pub const DEFAULT_RETENTION: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub compared_at: DateTime<Utc>,
    pub has_changes: bool,
    #[serde(default)]
    pub diff: Option<DiffResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateHistory {
    /// Newest first.
    entries: Vec<HistoryEntry>,
    #[serde(default = "default_retention")]
    retention: usize,
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    pub last_compared_at: Option<DateTime<Utc>>,
}

fn default_retention() -> usize {
    DEFAULT_RETENTION
}

impl Default for UpdateHistory {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            retention: DEFAULT_RETENTION,
            next_id: 0,
            last_compared_at: None,
        }
    }
}

impl UpdateHistory {
    /// Record a finished comparison. Returns true when the diff carried
    /// changes and therefore took a ring slot.
    pub fn record(&mut self, diff: DiffResult) -> bool {
        self.last_compared_at = Some(diff.generated_at);

        if !diff.has_changes() {
            debug!("Comparison found no changes; updating marker only");
            return false;
        }

        let entry = HistoryEntry {
            id: self.next_id,
            compared_at: diff.generated_at,
            has_changes: true,
            diff: Some(diff),
        };
        self.next_id += 1;
        self.entries.insert(0, entry);
        self.entries.truncate(self.retention);
        true
    }

    /// Newest-first view of retained entries.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Fallback for the UI when the latest comparison was quiet.
    pub fn most_recent_with_changes(&self) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.has_changes)
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Adjust retention at runtime; shrinking truncates immediately.
    pub fn set_retention(&mut self, retention: usize) {
        self.retention = retention.max(1);
        self.entries.truncate(self.retention);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeField, ClubChangeSet};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, minute, 0).unwrap()
    }

    fn diff_with_changes(minute: u32) -> DiffResult {
        let mut clubs = BTreeMap::new();
        clubs.insert(
            1,
            ClubChangeSet {
                club_id: 1,
                display_name: "Club 1".to_string(),
                changes: vec![ChangeField {
                    field_key: "league.points".to_string(),
                    label: "Points".to_string(),
                    previous: "15".to_string(),
                    current: "18".to_string(),
                }],
            },
        );
        DiffResult {
            clubs,
            generated_at: at(minute),
        }
    }

    #[test]
    fn ring_never_exceeds_retention() {
        let mut history = UpdateHistory::default();
        history.set_retention(3);
        for minute in 0..10 {
            history.record(diff_with_changes(minute));
        }
        assert_eq!(history.len(), 3);
        // Newest first
        assert_eq!(history.entries()[0].compared_at, at(9));
    }

    #[test]
    fn quiet_comparison_updates_marker_without_taking_a_slot() {
        let mut history = UpdateHistory::default();
        assert!(history.record(diff_with_changes(0)));

        assert!(!history.record(DiffResult::empty(at(5))));
        assert_eq!(history.len(), 1);
        assert_eq!(history.last_compared_at, Some(at(5)));
        // The meaningful entry is still the fallback
        assert_eq!(history.most_recent_with_changes().map(|e| e.compared_at), Some(at(0)));
    }

    #[test]
    fn shrinking_retention_truncates() {
        let mut history = UpdateHistory::default();
        for minute in 0..5 {
            history.record(diff_with_changes(minute));
        }
        history.set_retention(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.retention(), 2);
    }

    #[test]
    fn entry_ids_are_monotonic() {
        let mut history = UpdateHistory::default();
        history.set_retention(2);
        for minute in 0..4 {
            history.record(diff_with_changes(minute));
        }
        let ids: Vec<u64> = history.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
