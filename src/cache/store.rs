//! In-memory snapshot store: per-club, per-category (current, previous)
//! pairs with fetch timestamps.
//!
//! The store is replaced wholesale when a refresh commits; everything
//! else reads it as an immutable value. `commit` on a slot is the only
//! mutation primitive and always rotates the old current into previous.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    ArenaReport, Category, ClubId, CoachReport, FanClubReport, FinanceEstimate, FormationLog,
    LeaguePerformance, ManagerActivity, PressAnnouncement, TrackedClub, TransferActivity,
    TsiReport, WageReport,
};

/// Snapshots older than this are dropped when the cache is loaded.
/// 90 days keeps a season of context without unbounded growth.
pub const SNAPSHOT_MAX_AGE_DAYS: i64 = 90;

/// A category value plus the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self { value, fetched_at }
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_minutes()
    }

    /// Humanized age for status bars.
    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age_minutes(now);
        if minutes < 1 {
            // Covers clock skew as well
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// The (current, previous) pair for one category of one club.
///
/// `previous` only ever holds a value that was rotated out of `current`,
/// so `current.fetched_at >= previous.fetched_at` whenever both exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySlot<T> {
    #[serde(default = "Option::default")]
    pub current: Option<Snapshot<T>>,
    #[serde(default = "Option::default")]
    pub previous: Option<Snapshot<T>>,
}

impl<T> Default for CategorySlot<T> {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
        }
    }
}

impl<T> CategorySlot<T> {
    /// Rotate-on-write: the old current becomes previous.
    pub fn commit(&mut self, value: T, fetched_at: DateTime<Utc>) {
        self.previous = self.current.take();
        self.current = Some(Snapshot::new(value, fetched_at));
    }

    /// Drop `previous` when stale; drop the whole slot when `current`
    /// itself is stale.
    pub fn prune(&mut self, cutoff: DateTime<Utc>) {
        if let Some(ref current) = self.current {
            if current.fetched_at < cutoff {
                self.current = None;
                self.previous = None;
                return;
            }
        }
        if let Some(ref previous) = self.previous {
            if previous.fetched_at < cutoff {
                self.previous = None;
            }
        }
    }

    pub fn current_value(&self) -> Option<&T> {
        self.current.as_ref().map(|s| &s.value)
    }

    pub fn previous_value(&self) -> Option<&T> {
        self.previous.as_ref().map(|s| &s.value)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.previous.is_none()
    }
}

/// Tagged union over the per-category payload types; the currency of the
/// generic commit path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CategoryValue {
    League(LeaguePerformance),
    Press(PressAnnouncement),
    FanClub(FanClubReport),
    Arena(ArenaReport),
    Finance(FinanceEstimate),
    Transfers(TransferActivity),
    Tsi(TsiReport),
    Wages(WageReport),
    Formations(FormationLog),
    LastLogin(ManagerActivity),
    Coach(CoachReport),
}

impl CategoryValue {
    pub fn category(&self) -> Category {
        match self {
            CategoryValue::League(_) => Category::League,
            CategoryValue::Press(_) => Category::Press,
            CategoryValue::FanClub(_) => Category::FanClub,
            CategoryValue::Arena(_) => Category::Arena,
            CategoryValue::Finance(_) => Category::Finance,
            CategoryValue::Transfers(_) => Category::Transfers,
            CategoryValue::Tsi(_) => Category::Tsi,
            CategoryValue::Wages(_) => Category::Wages,
            CategoryValue::Formations(_) => Category::Formations,
            CategoryValue::LastLogin(_) => Category::LastLogin,
            CategoryValue::Coach(_) => Category::Coach,
        }
    }
}

/// Cached state for one club: identity metadata plus one slot per
/// category, each independently nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubRecord {
    pub info: TrackedClub,
    #[serde(default)]
    pub league: CategorySlot<LeaguePerformance>,
    #[serde(default)]
    pub press: CategorySlot<PressAnnouncement>,
    #[serde(default)]
    pub fan_club: CategorySlot<FanClubReport>,
    #[serde(default)]
    pub arena: CategorySlot<ArenaReport>,
    #[serde(default)]
    pub finance: CategorySlot<FinanceEstimate>,
    #[serde(default)]
    pub transfers: CategorySlot<TransferActivity>,
    #[serde(default)]
    pub tsi: CategorySlot<TsiReport>,
    #[serde(default)]
    pub wages: CategorySlot<WageReport>,
    #[serde(default)]
    pub formations: CategorySlot<FormationLog>,
    #[serde(default)]
    pub last_login: CategorySlot<ManagerActivity>,
    #[serde(default)]
    pub coach: CategorySlot<CoachReport>,
}

impl ClubRecord {
    pub fn new(info: TrackedClub) -> Self {
        Self {
            info,
            league: CategorySlot::default(),
            press: CategorySlot::default(),
            fan_club: CategorySlot::default(),
            arena: CategorySlot::default(),
            finance: CategorySlot::default(),
            transfers: CategorySlot::default(),
            tsi: CategorySlot::default(),
            wages: CategorySlot::default(),
            formations: CategorySlot::default(),
            last_login: CategorySlot::default(),
            coach: CategorySlot::default(),
        }
    }

    pub fn commit(&mut self, value: CategoryValue, fetched_at: DateTime<Utc>) {
        match value {
            CategoryValue::League(v) => self.league.commit(v, fetched_at),
            CategoryValue::Press(v) => self.press.commit(v, fetched_at),
            CategoryValue::FanClub(v) => self.fan_club.commit(v, fetched_at),
            CategoryValue::Arena(v) => self.arena.commit(v, fetched_at),
            CategoryValue::Finance(v) => self.finance.commit(v, fetched_at),
            CategoryValue::Transfers(v) => self.transfers.commit(v, fetched_at),
            CategoryValue::Tsi(v) => self.tsi.commit(v, fetched_at),
            CategoryValue::Wages(v) => self.wages.commit(v, fetched_at),
            CategoryValue::Formations(v) => self.formations.commit(v, fetched_at),
            CategoryValue::LastLogin(v) => self.last_login.commit(v, fetched_at),
            CategoryValue::Coach(v) => self.coach.commit(v, fetched_at),
        }
    }

    pub fn has_current(&self, category: Category) -> bool {
        match category {
            Category::League => self.league.current.is_some(),
            Category::Press => self.press.current.is_some(),
            Category::FanClub => self.fan_club.current.is_some(),
            Category::Arena => self.arena.current.is_some(),
            Category::Finance => self.finance.current.is_some(),
            Category::Transfers => self.transfers.current.is_some(),
            Category::Tsi => self.tsi.current.is_some(),
            Category::Wages => self.wages.current.is_some(),
            Category::Formations => self.formations.current.is_some(),
            Category::LastLogin => self.last_login.current.is_some(),
            Category::Coach => self.coach.current.is_some(),
        }
    }

    /// Categories with no current snapshot; a non-empty result marks the
    /// club as a backfill candidate.
    pub fn missing_categories(&self) -> Vec<Category> {
        Category::ALL
            .iter()
            .copied()
            .filter(|c| !self.has_current(*c))
            .collect()
    }

    pub fn prune(&mut self, cutoff: DateTime<Utc>) {
        self.league.prune(cutoff);
        self.press.prune(cutoff);
        self.fan_club.prune(cutoff);
        self.arena.prune(cutoff);
        self.finance.prune(cutoff);
        self.transfers.prune(cutoff);
        self.tsi.prune(cutoff);
        self.wages.prune(cutoff);
        self.formations.prune(cutoff);
        self.last_login.prune(cutoff);
        self.coach.prune(cutoff);
    }

    fn current_times(&self) -> Vec<DateTime<Utc>> {
        let mut times = Vec::new();
        let mut push = |t: Option<DateTime<Utc>>| {
            if let Some(t) = t {
                times.push(t);
            }
        };
        push(self.league.current.as_ref().map(|s| s.fetched_at));
        push(self.press.current.as_ref().map(|s| s.fetched_at));
        push(self.fan_club.current.as_ref().map(|s| s.fetched_at));
        push(self.arena.current.as_ref().map(|s| s.fetched_at));
        push(self.finance.current.as_ref().map(|s| s.fetched_at));
        push(self.transfers.current.as_ref().map(|s| s.fetched_at));
        push(self.tsi.current.as_ref().map(|s| s.fetched_at));
        push(self.wages.current.as_ref().map(|s| s.fetched_at));
        push(self.formations.current.as_ref().map(|s| s.fetched_at));
        push(self.last_login.current.as_ref().map(|s| s.fetched_at));
        push(self.coach.current.as_ref().map(|s| s.fetched_at));
        times
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.current_times().into_iter().max()
    }

    fn is_empty(&self) -> bool {
        self.league.is_empty()
            && self.press.is_empty()
            && self.fan_club.is_empty()
            && self.arena.is_empty()
            && self.finance.is_empty()
            && self.transfers.is_empty()
            && self.tsi.is_empty()
            && self.wages.is_empty()
            && self.formations.is_empty()
            && self.last_login.is_empty()
            && self.coach.is_empty()
    }
}

/// The full snapshot cache. Keyed with a BTreeMap so iteration, and
/// therefore diff output, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamCache {
    pub clubs: BTreeMap<ClubId, ClubRecord>,
}

impl TeamCache {
    pub fn record(&self, club: ClubId) -> Option<&ClubRecord> {
        self.clubs.get(&club)
    }

    /// Record for a club, created lazily on first successful fetch.
    /// Routing metadata is refreshed from `info` on every call.
    pub fn record_mut(&mut self, info: &TrackedClub) -> &mut ClubRecord {
        let record = self
            .clubs
            .entry(info.id)
            .or_insert_with(|| ClubRecord::new(info.clone()));
        record.info.name = info.name.clone();
        if info.league_unit_id.is_some() {
            record.info.league_unit_id = info.league_unit_id;
        }
        if info.arena_id.is_some() {
            record.info.arena_id = info.arena_id;
        }
        record
    }

    /// The only mutation primitive: rotate the slot for one category.
    pub fn commit_category(
        &mut self,
        info: &TrackedClub,
        value: CategoryValue,
        fetched_at: DateTime<Utc>,
    ) {
        self.record_mut(info).commit(value, fetched_at);
    }

    /// Age-based pruning; runs on every load from persisted state.
    /// Records left with no slots at all are dropped entirely.
    pub fn prune(&mut self, max_age: Duration, now: DateTime<Utc>) {
        let cutoff = now - max_age;
        for record in self.clubs.values_mut() {
            record.prune(cutoff);
        }
        self.clubs.retain(|_, record| !record.is_empty());
    }

    /// Max fetch time across all slots; seeds the staleness clock when no
    /// explicit last-full-refresh marker was persisted.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.clubs
            .values()
            .filter_map(|r| r.latest_timestamp())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, minute, 0).unwrap()
    }

    fn fan_club(members: i64) -> CategoryValue {
        CategoryValue::FanClub(FanClubReport {
            name: None,
            members,
        })
    }

    fn club(id: ClubId) -> TrackedClub {
        TrackedClub::new(id, format!("Club {}", id))
    }

    #[test]
    fn commit_rotates_current_into_previous() {
        let mut cache = TeamCache::default();
        let info = club(7);

        cache.commit_category(&info, fan_club(100), at(0));
        cache.commit_category(&info, fan_club(110), at(5));
        cache.commit_category(&info, fan_club(125), at(10));

        let slot = &cache.record(7).unwrap().fan_club;
        assert_eq!(slot.current_value().map(|f| f.members), Some(125));
        assert_eq!(slot.previous_value().map(|f| f.members), Some(110));
        assert!(slot.current.as_ref().unwrap().fetched_at >= slot.previous.as_ref().unwrap().fetched_at);
    }

    #[test]
    fn record_is_created_lazily_on_first_commit() {
        let mut cache = TeamCache::default();
        assert!(cache.record(7).is_none());
        cache.commit_category(&club(7), fan_club(1), at(0));
        assert!(cache.record(7).is_some());
    }

    #[test]
    fn prune_drops_stale_previous_then_whole_slot() {
        let mut cache = TeamCache::default();
        let info = club(7);
        cache.commit_category(&info, fan_club(100), at(0));
        cache.commit_category(&info, fan_club(110), at(30));

        // previous (minute 0) is stale, current (minute 30) survives
        cache.prune(Duration::minutes(20), at(40));
        let slot = &cache.record(7).unwrap().fan_club;
        assert!(slot.previous.is_none());
        assert_eq!(slot.current_value().map(|f| f.members), Some(110));

        // now current is stale too: the record empties out and is dropped
        cache.prune(Duration::minutes(20), at(55));
        assert!(cache.record(7).is_none());
    }

    #[test]
    fn prune_is_idempotent() {
        let mut cache = TeamCache::default();
        let info = club(7);
        cache.commit_category(&info, fan_club(100), at(0));
        cache.commit_category(&info, fan_club(110), at(30));

        cache.prune(Duration::minutes(20), at(40));
        let once = cache.clone();
        cache.prune(Duration::minutes(20), at(40));
        assert_eq!(cache, once);
    }

    #[test]
    fn latest_timestamp_spans_all_slots() {
        let mut cache = TeamCache::default();
        cache.commit_category(&club(1), fan_club(1), at(3));
        cache.commit_category(
            &club(2),
            CategoryValue::Wages(WageReport {
                total_weekly: 10,
                highest_wage: 10,
                highest_paid: None,
            }),
            at(9),
        );
        assert_eq!(cache.latest_timestamp(), Some(at(9)));
        assert_eq!(TeamCache::default().latest_timestamp(), None);
    }

    #[test]
    fn missing_categories_reports_unfetched_slots() {
        let mut cache = TeamCache::default();
        cache.commit_category(&club(1), fan_club(1), at(0));
        let missing = cache.record(1).unwrap().missing_categories();
        assert_eq!(missing.len(), Category::ALL.len() - 1);
        assert!(!missing.contains(&Category::FanClub));
    }

    #[test]
    fn snapshot_age_display() {
        let snap = Snapshot::new(1, at(0));
        assert_eq!(snap.age_display(at(0)), "just now");
        assert_eq!(snap.age_display(at(30)), "30m ago");
        assert_eq!(snap.age_display(at(0) + Duration::hours(5)), "5h ago");
        assert_eq!(snap.age_display(at(0) + Duration::days(3)), "3d ago");
    }
}
