//! Club identity and the categories served by the club-details endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ArenaId, ClubId, LeagueUnitId};

/// A club the user chose to follow. Identity and routing metadata are
/// supplied externally; the engine only caches them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedClub {
    pub id: ClubId,
    pub name: String,
    pub league_unit_id: Option<LeagueUnitId>,
    pub arena_id: Option<ArenaId>,
}

impl TrackedClub {
    pub fn new(id: ClubId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            league_unit_id: None,
            arena_id: None,
        }
    }
}

/// Everything the club-details endpoint yields in a single fetch:
/// identity, routing ids, the current press announcement and fan club.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubDetails {
    pub club_id: ClubId,
    pub name: String,
    pub league_unit_id: Option<LeagueUnitId>,
    pub arena_id: Option<ArenaId>,
    pub arena_name: Option<String>,
    pub fan_club: FanClubReport,
    pub press: Option<PressAnnouncement>,
}

/// The club's current press announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressAnnouncement {
    pub subject: String,
    pub body: String,
    pub published: Option<DateTime<Utc>>,
}

impl PressAnnouncement {
    /// Content fingerprint over subject, body and publication date.
    /// Any wording change counts as one change, not one per field.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.subject.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.body.as_bytes());
        hasher.update([0u8]);
        if let Some(published) = self.published {
            hasher.update(published.timestamp().to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Fan club name and membership count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanClubReport {
    pub name: Option<String>,
    pub members: i64,
}

/// Arena detail as returned by the arena endpoint (stage 4); the club
/// details fetch only carries the arena id and name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaReport {
    pub arena_id: ArenaId,
    pub name: Option<String>,
    pub capacity: i64,
    pub under_construction: bool,
}

/// The club's trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachReport {
    pub name: String,
    pub coach_type: String,
    pub leadership: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(subject: &str, body: &str) -> PressAnnouncement {
        PressAnnouncement {
            subject: subject.to_string(),
            body: body.to_string(),
            published: None,
        }
    }

    #[test]
    fn fingerprint_is_stable_for_identical_content() {
        assert_eq!(
            press("Derby win", "Great game.").fingerprint(),
            press("Derby win", "Great game.").fingerprint()
        );
    }

    #[test]
    fn fingerprint_changes_with_any_field() {
        let base = press("Derby win", "Great game.");
        assert_ne!(base.fingerprint(), press("Derby win", "Great game!").fingerprint());
        assert_ne!(base.fingerprint(), press("Derby loss", "Great game.").fingerprint());
    }

    #[test]
    fn fingerprint_separates_subject_and_body() {
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(press("ab", "c").fingerprint(), press("a", "bc").fingerprint());
    }
}
