//! Change detection between two cache states.
//!
//! A diff runs either "since last fetch" (a record's own previous slot
//! against its current) or "since baseline" (a frozen cache's current
//! against the live one). Absence on either side is never a change: the
//! first observation of a category just seeds the cache.
//!
//! Categories and fields are compared in their declared order; output
//! order never depends on change magnitude.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::store::{CategorySlot, ClubRecord, TeamCache};
use crate::models::{
    ArenaReport, Category, ClubId, CoachReport, FanClubReport, FinanceEstimate, FormationLog,
    LeaguePerformance, ManagerActivity, PressAnnouncement, TransferActivity, TransferKind,
    TsiReport, WageReport,
};
use crate::utils::format::{format_date, format_injury, format_money, format_number, format_optional};

/// One changed field, both sides already rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeField {
    pub field_key: String,
    pub label: String,
    pub previous: String,
    pub current: String,
}

/// All changes found for one club. Clubs with zero changes are dropped
/// from the result entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubChangeSet {
    pub club_id: ClubId,
    pub display_name: String,
    pub changes: Vec<ChangeField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub clubs: BTreeMap<ClubId, ClubChangeSet>,
    pub generated_at: DateTime<Utc>,
}

impl DiffResult {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            clubs: BTreeMap::new(),
            generated_at,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.clubs.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.clubs.values().map(|c| c.changes.len()).sum()
    }
}

/// Compute the change set between `target` and a previous state.
///
/// With a `baseline`, the previous side of every comparison is the
/// baseline's current snapshot; without one, it is the target's own
/// rotated previous slot. `clubs = None` means every club in the target.
pub fn diff(
    target: &TeamCache,
    baseline: Option<&TeamCache>,
    categories: &[Category],
    clubs: Option<&[ClubId]>,
    generated_at: DateTime<Utc>,
) -> DiffResult {
    // Honor the declared category order regardless of how the caller
    // assembled the selection.
    let selected: Vec<Category> = Category::ALL
        .iter()
        .copied()
        .filter(|c| categories.contains(c))
        .collect();

    let mut result = DiffResult::empty(generated_at);

    for (club_id, record) in &target.clubs {
        if let Some(filter) = clubs {
            if !filter.contains(club_id) {
                continue;
            }
        }

        let baseline_record = baseline.and_then(|b| b.record(*club_id));
        let changes = diff_record(record, baseline_record, baseline.is_some(), &selected);
        if !changes.is_empty() {
            result.clubs.insert(
                *club_id,
                ClubChangeSet {
                    club_id: *club_id,
                    display_name: record.info.name.clone(),
                    changes,
                },
            );
        }
    }

    result
}

fn diff_record(
    record: &ClubRecord,
    baseline: Option<&ClubRecord>,
    since_baseline: bool,
    categories: &[Category],
) -> Vec<ChangeField> {
    let mut changes = Vec::new();

    for category in categories {
        match category {
            Category::League => {
                if let Some((prev, cur)) =
                    sides(&record.league, baseline.map(|b| &b.league), since_baseline)
                {
                    compare_league(prev, cur, &mut changes);
                }
            }
            Category::Press => {
                if let Some((prev, cur)) =
                    sides(&record.press, baseline.map(|b| &b.press), since_baseline)
                {
                    compare_press(prev, cur, &mut changes);
                }
            }
            Category::FanClub => {
                if let Some((prev, cur)) =
                    sides(&record.fan_club, baseline.map(|b| &b.fan_club), since_baseline)
                {
                    compare_fan_club(prev, cur, &mut changes);
                }
            }
            Category::Arena => {
                if let Some((prev, cur)) =
                    sides(&record.arena, baseline.map(|b| &b.arena), since_baseline)
                {
                    compare_arena(prev, cur, &mut changes);
                }
            }
            Category::Finance => {
                if let Some((prev, cur)) =
                    sides(&record.finance, baseline.map(|b| &b.finance), since_baseline)
                {
                    compare_finance(prev, cur, &mut changes);
                }
            }
            Category::Transfers => {
                if let Some((prev, cur)) =
                    sides(&record.transfers, baseline.map(|b| &b.transfers), since_baseline)
                {
                    compare_transfers(prev, cur, &mut changes);
                }
            }
            Category::Tsi => {
                if let Some((prev, cur)) =
                    sides(&record.tsi, baseline.map(|b| &b.tsi), since_baseline)
                {
                    compare_tsi(prev, cur, &mut changes);
                }
            }
            Category::Wages => {
                if let Some((prev, cur)) =
                    sides(&record.wages, baseline.map(|b| &b.wages), since_baseline)
                {
                    compare_wages(prev, cur, &mut changes);
                }
            }
            Category::Formations => {
                if let Some((prev, cur)) =
                    sides(&record.formations, baseline.map(|b| &b.formations), since_baseline)
                {
                    compare_formations(prev, cur, &mut changes);
                }
            }
            Category::LastLogin => {
                if let Some((prev, cur)) =
                    sides(&record.last_login, baseline.map(|b| &b.last_login), since_baseline)
                {
                    compare_last_login(prev, cur, &mut changes);
                }
            }
            Category::Coach => {
                if let Some((prev, cur)) =
                    sides(&record.coach, baseline.map(|b| &b.coach), since_baseline)
                {
                    compare_coach(prev, cur, &mut changes);
                }
            }
        }
    }

    changes
}

/// Pick the (previous, current) pair for one slot, or None when either
/// side is absent.
fn sides<'a, T>(
    slot: &'a CategorySlot<T>,
    baseline_slot: Option<&'a CategorySlot<T>>,
    since_baseline: bool,
) -> Option<(&'a T, &'a T)> {
    let current = slot.current_value()?;
    let previous = if since_baseline {
        baseline_slot?.current_value()?
    } else {
        slot.previous_value()?
    };
    Some((previous, current))
}

fn push_scalar<T, F>(
    changes: &mut Vec<ChangeField>,
    key: &str,
    label: &str,
    previous: &T,
    current: &T,
    render: F,
) where
    T: PartialEq,
    F: Fn(&T) -> String,
{
    if previous != current {
        changes.push(ChangeField {
            field_key: key.to_string(),
            label: label.to_string(),
            previous: render(previous),
            current: render(current),
        });
    }
}

fn compare_league(prev: &LeaguePerformance, cur: &LeaguePerformance, changes: &mut Vec<ChangeField>) {
    push_scalar(changes, "league.position", "Position", &prev.position, &cur.position, |v| {
        format_number(*v as i64)
    });
    push_scalar(changes, "league.points", "Points", &prev.points, &cur.points, |v| {
        format_number(*v as i64)
    });
    push_scalar(
        changes,
        "league.matches_played",
        "Matches played",
        &prev.matches_played,
        &cur.matches_played,
        |v| format_number(*v as i64),
    );
    push_scalar(
        changes,
        "league.goals_for",
        "Goals for",
        &prev.goals_for,
        &cur.goals_for,
        |v| format_number(*v as i64),
    );
    push_scalar(
        changes,
        "league.goals_against",
        "Goals against",
        &prev.goals_against,
        &cur.goals_against,
        |v| format_number(*v as i64),
    );
}

/// A press announcement is compared by content fingerprint so a reworded
/// announcement counts once, not once per field.
fn compare_press(prev: &PressAnnouncement, cur: &PressAnnouncement, changes: &mut Vec<ChangeField>) {
    if prev.fingerprint() != cur.fingerprint() {
        changes.push(ChangeField {
            field_key: "press.announcement".to_string(),
            label: "Press announcement".to_string(),
            previous: prev.subject.clone(),
            current: cur.subject.clone(),
        });
    }
}

fn compare_fan_club(prev: &FanClubReport, cur: &FanClubReport, changes: &mut Vec<ChangeField>) {
    push_scalar(changes, "fanclub.members", "Members", &prev.members, &cur.members, |v| {
        format_number(*v)
    });
    push_scalar(changes, "fanclub.name", "Fan club name", &prev.name, &cur.name, |v| {
        format_optional(v, "unnamed")
    });
}

fn compare_arena(prev: &ArenaReport, cur: &ArenaReport, changes: &mut Vec<ChangeField>) {
    push_scalar(changes, "arena.capacity", "Capacity", &prev.capacity, &cur.capacity, |v| {
        format_number(*v)
    });
    push_scalar(changes, "arena.name", "Arena name", &prev.name, &cur.name, |v| {
        format_optional(v, "unnamed")
    });
    push_scalar(
        changes,
        "arena.under_construction",
        "Under construction",
        &prev.under_construction,
        &cur.under_construction,
        |v| if *v { "yes".to_string() } else { "no".to_string() },
    );
}

fn compare_finance(prev: &FinanceEstimate, cur: &FinanceEstimate, changes: &mut Vec<ChangeField>) {
    push_scalar(
        changes,
        "finance.weekly_wages",
        "Weekly wages",
        &prev.weekly_wages,
        &cur.weekly_wages,
        |v| format_money(*v),
    );
    push_scalar(
        changes,
        "finance.transfer_spend",
        "Transfer spend",
        &prev.transfer_spend,
        &cur.transfer_spend,
        |v| format_money(*v),
    );
    push_scalar(
        changes,
        "finance.transfer_income",
        "Transfer income",
        &prev.transfer_income,
        &cur.transfer_income,
        |v| format_money(*v),
    );
}

/// Counters gate the detail diff: only when a counter moved do we look
/// for newly appeared records, and we cap them to the counter delta so a
/// re-keyed backlog cannot flood the report.
fn compare_transfers(prev: &TransferActivity, cur: &TransferActivity, changes: &mut Vec<ChangeField>) {
    let bought_delta = i64::from(cur.bought) - i64::from(prev.bought);
    let sold_delta = i64::from(cur.sold) - i64::from(prev.sold);

    push_scalar(changes, "transfers.bought", "Bought", &prev.bought, &cur.bought, |v| {
        format_number(i64::from(*v))
    });
    push_scalar(changes, "transfers.sold", "Sold", &prev.sold, &cur.sold, |v| {
        format_number(i64::from(*v))
    });

    if bought_delta > 0 {
        push_new_records(changes, prev, cur, TransferKind::Buy, bought_delta as usize, "transfers.players_bought", "Players bought");
    }
    if sold_delta > 0 {
        push_new_records(changes, prev, cur, TransferKind::Sell, sold_delta as usize, "transfers.players_sold", "Players sold");
    }
}

fn push_new_records(
    changes: &mut Vec<ChangeField>,
    prev: &TransferActivity,
    cur: &TransferActivity,
    kind: TransferKind,
    cap: usize,
    key: &str,
    label: &str,
) {
    let known: Vec<String> = prev
        .records
        .iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.synthetic_key())
        .collect();

    let appeared: Vec<String> = cur
        .records
        .iter()
        .filter(|r| r.kind == kind && !known.contains(&r.synthetic_key()))
        .take(cap)
        .map(|r| format!("{} ({})", r.player_name, format_money(r.price)))
        .collect();

    if !appeared.is_empty() {
        changes.push(ChangeField {
            field_key: key.to_string(),
            label: label.to_string(),
            previous: "none".to_string(),
            current: appeared.join(", "),
        });
    }
}

/// Total TSI is a scalar; injuries are a set keyed by player id, emitted
/// as one summarizing field covering only the players whose status moved.
fn compare_tsi(prev: &TsiReport, cur: &TsiReport, changes: &mut Vec<ChangeField>) {
    push_scalar(changes, "tsi.total", "Total TSI", &prev.total, &cur.total, |v| {
        format_number(*v)
    });

    let mut before = Vec::new();
    let mut after = Vec::new();
    for (id, cur_player) in &cur.players {
        if let Some(prev_player) = prev.players.get(id) {
            if prev_player.injury_weeks != cur_player.injury_weeks {
                before.push(format!("{} {}", cur_player.name, format_injury(prev_player.injury_weeks)));
                after.push(format!("{} {}", cur_player.name, format_injury(cur_player.injury_weeks)));
            }
        }
    }

    if !after.is_empty() {
        changes.push(ChangeField {
            field_key: "tsi.injuries".to_string(),
            label: "Injuries".to_string(),
            previous: before.join("; "),
            current: after.join("; "),
        });
    }
}

fn compare_wages(prev: &WageReport, cur: &WageReport, changes: &mut Vec<ChangeField>) {
    push_scalar(
        changes,
        "wages.total_weekly",
        "Total weekly wages",
        &prev.total_weekly,
        &cur.total_weekly,
        |v| format_money(*v),
    );
    push_scalar(
        changes,
        "wages.highest",
        "Highest wage",
        &(prev.highest_wage, prev.highest_paid.clone()),
        &(cur.highest_wage, cur.highest_paid.clone()),
        |(wage, who)| match who {
            Some(name) => format!("{} ({})", format_money(*wage), name),
            None => format_money(*wage),
        },
    );
}

fn compare_formations(prev: &FormationLog, cur: &FormationLog, changes: &mut Vec<ChangeField>) {
    push_scalar(
        changes,
        "formations.matches_recorded",
        "Matches recorded",
        &prev.matches_recorded(),
        &cur.matches_recorded(),
        |v| format_number(*v as i64),
    );
    push_scalar(
        changes,
        "formations.latest_formation",
        "Latest formation",
        &prev.latest().map(|t| t.formation.clone()),
        &cur.latest().map(|t| t.formation.clone()),
        |v| format_optional(v, "unknown"),
    );
    push_scalar(
        changes,
        "formations.latest_tactic",
        "Latest tactic",
        &prev.latest().map(|t| t.tactic.clone()),
        &cur.latest().map(|t| t.tactic.clone()),
        |v| format_optional(v, "unknown"),
    );
}

fn compare_last_login(prev: &ManagerActivity, cur: &ManagerActivity, changes: &mut Vec<ChangeField>) {
    push_scalar(
        changes,
        "last_login.at",
        "Last login",
        &prev.last_login,
        &cur.last_login,
        |v| format_date(*v),
    );
}

fn compare_coach(prev: &CoachReport, cur: &CoachReport, changes: &mut Vec<ChangeField>) {
    push_scalar(changes, "coach.type", "Coach type", &prev.coach_type, &cur.coach_type, |v| {
        v.clone()
    });
    push_scalar(changes, "coach.name", "Coach", &prev.name, &cur.name, |v| v.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CategoryValue;
    use crate::models::{PlayerCondition, TrackedClub, TransferRecord};
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, minute, 0).unwrap()
    }

    fn club(id: ClubId) -> TrackedClub {
        TrackedClub::new(id, format!("Club {}", id))
    }

    fn league(position: u32, points: i32) -> LeaguePerformance {
        LeaguePerformance {
            series_name: None,
            position,
            points,
            matches_played: 7,
            goals_for: 12,
            goals_against: 9,
            manager_id: None,
        }
    }

    #[test]
    fn points_change_yields_exactly_one_field() {
        // Scenario: position held at 5 while points moved 15 -> 18.
        let mut cache = TeamCache::default();
        let info = club(42);
        cache.commit_category(&info, CategoryValue::League(league(5, 15)), at(0));
        cache.commit_category(&info, CategoryValue::League(league(5, 18)), at(10));

        let result = diff(&cache, None, &[Category::League], None, at(11));
        let set = result.clubs.get(&42).expect("club 42 changed");
        assert_eq!(set.changes.len(), 1);
        let field = &set.changes[0];
        assert_eq!(field.field_key, "league.points");
        assert_eq!(field.previous, "15");
        assert_eq!(field.current, "18");
    }

    #[test]
    fn diff_against_itself_is_empty() {
        let mut cache = TeamCache::default();
        let info = club(42);
        cache.commit_category(&info, CategoryValue::League(league(5, 15)), at(0));
        cache.commit_category(&info, CategoryValue::League(league(3, 21)), at(10));

        let result = diff(&cache, Some(&cache), &Category::ALL, None, at(11));
        assert!(!result.has_changes());
    }

    #[test]
    fn first_observation_is_not_a_change() {
        let mut cache = TeamCache::default();
        cache.commit_category(&club(42), CategoryValue::League(league(5, 15)), at(0));

        // No previous slot and no baseline record on the other side.
        assert!(!diff(&cache, None, &Category::ALL, None, at(1)).has_changes());
        let empty = TeamCache::default();
        assert!(!diff(&cache, Some(&empty), &Category::ALL, None, at(1)).has_changes());
    }

    #[test]
    fn press_rewording_counts_once() {
        let mut cache = TeamCache::default();
        let info = club(1);
        let announcement = |body: &str| PressAnnouncement {
            subject: "Matchday".to_string(),
            body: body.to_string(),
            published: Some(at(0)),
        };
        cache.commit_category(&info, CategoryValue::Press(announcement("We won.")), at(0));
        cache.commit_category(&info, CategoryValue::Press(announcement("We won big.")), at(5));

        let result = diff(&cache, None, &[Category::Press], None, at(6));
        let set = result.clubs.get(&1).unwrap();
        assert_eq!(set.changes.len(), 1);
        assert_eq!(set.changes[0].field_key, "press.announcement");
    }

    #[test]
    fn unmoved_counters_suppress_transfer_detail_diff() {
        let record = |id: i64, name: &str| TransferRecord {
            transfer_id: Some(id),
            kind: TransferKind::Sell,
            player_name: name.to_string(),
            deadline: None,
            price: 1000,
        };

        // Same counters, different record keys: nothing to report.
        let prev = TransferActivity {
            bought: 0,
            sold: 2,
            records: vec![record(1, "A"), record(2, "B")],
        };
        let cur = TransferActivity {
            bought: 0,
            sold: 2,
            records: vec![record(3, "C"), record(4, "D")],
        };
        let mut changes = Vec::new();
        compare_transfers(&prev, &cur, &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn new_transfer_records_are_capped_to_counter_delta() {
        let record = |id: i64, name: &str| TransferRecord {
            transfer_id: Some(id),
            kind: TransferKind::Sell,
            player_name: name.to_string(),
            deadline: None,
            price: 50_000,
        };
        let prev = TransferActivity {
            bought: 0,
            sold: 1,
            records: vec![record(1, "A")],
        };
        // Counter moved by one but three records look new.
        let cur = TransferActivity {
            bought: 0,
            sold: 2,
            records: vec![record(2, "B"), record(3, "C"), record(4, "D")],
        };

        let mut changes = Vec::new();
        compare_transfers(&prev, &cur, &mut changes);

        let sold = changes.iter().find(|c| c.field_key == "transfers.players_sold").unwrap();
        assert_eq!(sold.current, "B (50 000 US$)");
    }

    #[test]
    fn injury_changes_summarize_only_moved_players() {
        let report = |ek_weeks: Option<u32>, berg_weeks: Option<u32>| {
            let mut players = BTreeMap::new();
            players.insert(1, PlayerCondition { name: "Ek".to_string(), tsi: 100, injury_weeks: ek_weeks });
            players.insert(2, PlayerCondition { name: "Berg".to_string(), tsi: 100, injury_weeks: berg_weeks });
            TsiReport { total: 200, players }
        };

        let mut changes = Vec::new();
        compare_tsi(&report(None, Some(2)), &report(Some(1), Some(2)), &mut changes);

        assert_eq!(changes.len(), 1);
        let field = &changes[0];
        assert_eq!(field.field_key, "tsi.injuries");
        assert_eq!(field.previous, "Ek healthy");
        assert_eq!(field.current, "Ek 1 week");
    }

    #[test]
    fn scoped_diff_ignores_other_clubs() {
        let mut cache = TeamCache::default();
        for id in [1, 2] {
            let info = club(id);
            cache.commit_category(&info, CategoryValue::League(league(5, 10)), at(0));
            cache.commit_category(&info, CategoryValue::League(league(5, 13)), at(5));
        }

        let result = diff(&cache, None, &Category::ALL, Some(&[2]), at(6));
        assert!(!result.clubs.contains_key(&1));
        assert!(result.clubs.contains_key(&2));
    }
}
