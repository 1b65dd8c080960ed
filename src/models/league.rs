//! League standing and manager activity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ManagerId;

/// One club's standing in its league series.
///
/// The manager id discovered here routes the last-login fetch; clubs run
/// by the same manager share a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaguePerformance {
    pub series_name: Option<String>,
    pub position: u32,
    pub points: i32,
    pub matches_played: u32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub manager_id: Option<ManagerId>,
}

impl LeaguePerformance {
    pub fn goal_difference(&self) -> i32 {
        self.goals_for - self.goals_against
    }
}

/// Last-seen activity for a manager account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerActivity {
    pub manager_id: ManagerId,
    pub last_login: Option<DateTime<Utc>>,
}
