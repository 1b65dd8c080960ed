//! Domain models for tracked clubs and their data categories.
//!
//! Each category is one independently fetched facet of a club's state.
//! Payload types are plain serde structs, decoupled from any wire format.

mod club;
mod league;
mod matches;
mod squad;

pub use club::{ArenaReport, ClubDetails, CoachReport, FanClubReport, PressAnnouncement, TrackedClub};
pub use league::{LeaguePerformance, ManagerActivity};
pub use matches::{FormationLog, MatchRef, MatchTactics};
pub use squad::{
    FinanceEstimate, Player, PlayerCondition, Squad, TransferActivity, TransferKind,
    TransferRecord, TsiReport, WageReport,
};

use serde::{Deserialize, Serialize};

pub type ClubId = i64;
pub type ManagerId = i64;
pub type MatchId = i64;
pub type LeagueUnitId = i64;
pub type ArenaId = i64;

/// One independently fetched facet of a club's state.
///
/// The declared order here is the order categories are diffed and
/// reported in; it never depends on change magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    League,
    Press,
    FanClub,
    Arena,
    Finance,
    Transfers,
    Tsi,
    Wages,
    Formations,
    LastLogin,
    Coach,
}

impl Category {
    /// Every category, in declared (diff) order.
    pub const ALL: [Category; 11] = [
        Category::League,
        Category::Press,
        Category::FanClub,
        Category::Arena,
        Category::Finance,
        Category::Transfers,
        Category::Tsi,
        Category::Wages,
        Category::Formations,
        Category::LastLogin,
        Category::Coach,
    ];

    /// Stable key used for field keys and persisted data.
    pub fn key(&self) -> &'static str {
        match self {
            Category::League => "league",
            Category::Press => "press",
            Category::FanClub => "fanclub",
            Category::Arena => "arena",
            Category::Finance => "finance",
            Category::Transfers => "transfers",
            Category::Tsi => "tsi",
            Category::Wages => "wages",
            Category::Formations => "formations",
            Category::LastLogin => "last_login",
            Category::Coach => "coach",
        }
    }

    /// Human-readable panel title.
    pub fn label(&self) -> &'static str {
        match self {
            Category::League => "League",
            Category::Press => "Press announcement",
            Category::FanClub => "Fan club",
            Category::Arena => "Arena",
            Category::Finance => "Finance estimate",
            Category::Transfers => "Transfer activity",
            Category::Tsi => "TSI",
            Category::Wages => "Wages",
            Category::Formations => "Formations & tactics",
            Category::LastLogin => "Last login",
            Category::Coach => "Coach",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_categories_have_unique_keys() {
        let mut keys: Vec<&str> = Category::ALL.iter().map(|c| c.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Category::ALL.len());
    }
}
