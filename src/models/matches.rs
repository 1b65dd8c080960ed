//! Match archive and per-match formation/tactic models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MatchId;

/// One entry in a club's match archive listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRef {
    pub match_id: MatchId,
    pub date: DateTime<Utc>,
    pub home: String,
    pub away: String,
    pub friendly: bool,
}

/// Formation and tactic used by the club in one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTactics {
    pub match_id: MatchId,
    pub date: DateTime<Utc>,
    pub formation: String,
    pub tactic: String,
    pub tactic_level: Option<u32>,
}

/// Recent formations/tactics, newest first, depth-capped at fetch time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormationLog {
    pub entries: Vec<MatchTactics>,
}

impl FormationLog {
    /// Build a log from unordered per-match results.
    pub fn from_entries(mut entries: Vec<MatchTactics>, depth: usize) -> Self {
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries.truncate(depth);
        Self { entries }
    }

    pub fn latest(&self) -> Option<&MatchTactics> {
        self.entries.first()
    }

    pub fn matches_recorded(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tactics(id: MatchId, day: u32, formation: &str) -> MatchTactics {
        MatchTactics {
            match_id: id,
            date: Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).unwrap(),
            formation: formation.to_string(),
            tactic: "Normal".to_string(),
            tactic_level: None,
        }
    }

    #[test]
    fn log_sorts_newest_first_and_caps_depth() {
        let log = FormationLog::from_entries(
            vec![tactics(1, 1, "4-4-2"), tactics(3, 9, "3-5-2"), tactics(2, 5, "5-3-2")],
            2,
        );
        assert_eq!(log.matches_recorded(), 2);
        assert_eq!(log.latest().map(|t| t.match_id), Some(3));
        assert_eq!(log.entries[1].match_id, 2);
    }
}
