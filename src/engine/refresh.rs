//! The staged refresh pipeline.
//!
//! Seven stages run in a fixed order because later stages depend on ids
//! discovered earlier: club details surface league and arena routing,
//! league standings surface manager ids. Each stage drains its worker
//! pool completely before the next one starts; within a stage,
//! completion order does not matter because results merge by club id.
//!
//! All merging happens on a private working copy of the cache. Only a
//! run that reaches the end commits, by replacing the visible cache
//! wholesale; a cancelled or reauth-aborted run leaves every visible
//! structure untouched.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::cache::store::CategoryValue;
use crate::cache::TeamCache;
use crate::diff;
use crate::models::{
    ArenaId, Category, ClubId, FormationLog, LeagueUnitId, ManagerId, MatchRef, MatchTactics,
    TrackedClub,
};

use super::pool::run_pool;
use super::progress::{ProgressSender, SubProgress};
use super::{Engine, RefreshOutcome, RefreshScope};
use crate::api::ClubApi;

/// Concurrency for the per-club metadata stages (details, league,
/// manager activity, arena). Polite to the rate limiter.
const METADATA_FETCH_LIMIT: usize = 4;

/// Concurrency for roster fetches; roster responses are heavy.
const SQUAD_FETCH_LIMIT: usize = 3;

/// Concurrency for per-match tactic fetches. This stage dominates a run
/// and the responses are tiny, so it gets the widest pool.
const MATCH_DETAIL_LIMIT: usize = 8;

/// Global percentage at the start of each stage. Stage 6 interpolates
/// its own sub-progress across the span up to the finalize mark.
const STAGE_PERCENT: [u8; 7] = [2, 18, 28, 36, 44, 58, 95];

impl<A: ClubApi> Engine<A> {
    /// Run the refresh pipeline for `scope`. Only one refresh may run
    /// at a time; a trigger while one is active is a no-op.
    pub async fn refresh(&mut self, scope: RefreshScope) -> RefreshOutcome {
        if self.refreshing {
            debug!("Refresh already running, ignoring trigger");
            return RefreshOutcome::AlreadyRunning;
        }
        self.refreshing = true;
        self.cancel.reset();
        info!(full = scope.is_full(), "Refresh starting");

        let outcome = self.run_pipeline(&scope).await;
        self.refreshing = false;

        let progress = ProgressSender::new(self.progress_tx.clone());
        match outcome {
            RefreshOutcome::Completed { changed } => {
                info!(changed, "Refresh complete");
            }
            RefreshOutcome::Stopped => {
                info!("Refresh stopped by user");
                progress.send(100, "Stopped", &[]);
            }
            RefreshOutcome::ReauthRequired => {
                warn!("Refresh aborted: reauthentication required");
                progress.send(100, "Login required", &[]);
            }
            RefreshOutcome::AlreadyRunning => {}
        }
        outcome
    }

    async fn run_pipeline(&mut self, scope: &RefreshScope) -> RefreshOutcome {
        let cancel = self.cancel.clone();
        let progress = ProgressSender::new(self.progress_tx.clone());
        let categories = scope.selected_categories();
        let wants = |c: Category| categories.contains(&c);

        let clubs: Vec<TrackedClub> = match &scope.clubs {
            Some(ids) => self
                .tracked
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect(),
            None => self.tracked.clone(),
        };

        // Private working copy; partial progress stays invisible until
        // the commit at the end.
        let mut work = self.cache.clone();

        // ---- Stage 1: identity, press, fan club, arena metadata ----

        let needs_routing = (wants(Category::League)
            && clubs.iter().any(|c| resolve_league_unit(c, &work).is_none()))
            || (wants(Category::Arena)
                && clubs.iter().any(|c| resolve_arena(c, &work).is_none()));

        if wants(Category::Press) || wants(Category::FanClub) || needs_routing {
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }
            progress.send(
                STAGE_PERCENT[0],
                "Fetching club details",
                &[Category::Press, Category::FanClub],
            );

            let results = {
                let api = &self.api;
                let cancel = cancel.clone();
                run_pool(clubs.clone(), METADATA_FETCH_LIMIT, move |club| {
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Ok((club, None));
                        }
                        match api.fetch_club_details(club.id).await {
                            Ok(details) => Ok((club, details)),
                            Err(e) if e.requires_reauth() => Err(e),
                            Err(e) => {
                                debug!(club = club.id, error = %e, "Club details fetch failed");
                                Ok((club, None))
                            }
                        }
                    }
                })
                .await
            };
            let results = match results {
                Ok(r) => r,
                Err(_) => return RefreshOutcome::ReauthRequired,
            };
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }

            let now = self.clock.now();
            for (club, details) in results {
                let Some(details) = details else { continue };
                let mut info = club;
                info.name = details.name.clone();
                if details.league_unit_id.is_some() {
                    info.league_unit_id = details.league_unit_id;
                }
                if details.arena_id.is_some() {
                    info.arena_id = details.arena_id;
                }

                if wants(Category::FanClub) {
                    work.commit_category(&info, CategoryValue::FanClub(details.fan_club.clone()), now);
                }
                if wants(Category::Press) {
                    if let Some(press) = details.press.clone() {
                        work.commit_category(&info, CategoryValue::Press(press), now);
                    }
                }
                // Routing metadata lands even when neither category from
                // this stage was selected.
                work.record_mut(&info);
            }
        }

        // ---- Stage 2: league performance ----

        if wants(Category::League) {
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }
            progress.send(STAGE_PERCENT[1], "Fetching league standings", &[Category::League]);

            let items: Vec<(TrackedClub, LeagueUnitId)> = clubs
                .iter()
                .filter_map(|c| resolve_league_unit(c, &work).map(|unit| (c.clone(), unit)))
                .collect();

            let results = {
                let api = &self.api;
                let cancel = cancel.clone();
                run_pool(items, METADATA_FETCH_LIMIT, move |(club, unit)| {
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Ok((club, None));
                        }
                        match api.fetch_league_performance(club.id, unit).await {
                            Ok(performance) => Ok((club, performance)),
                            Err(e) if e.requires_reauth() => Err(e),
                            Err(e) => {
                                debug!(club = club.id, error = %e, "League fetch failed");
                                Ok((club, None))
                            }
                        }
                    }
                })
                .await
            };
            let results = match results {
                Ok(r) => r,
                Err(_) => return RefreshOutcome::ReauthRequired,
            };
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }

            let now = self.clock.now();
            for (club, performance) in results {
                let Some(performance) = performance else { continue };
                work.commit_category(&club, CategoryValue::League(performance), now);
            }
        }

        // Manager routing comes from the freshest league snapshots,
        // fetched this run or cached earlier.
        let mut managers: BTreeMap<ManagerId, Vec<ClubId>> = BTreeMap::new();
        if wants(Category::LastLogin) {
            for club in &clubs {
                let manager = work
                    .record(club.id)
                    .and_then(|r| r.league.current_value())
                    .and_then(|performance| performance.manager_id);
                if let Some(manager) = manager {
                    managers.entry(manager).or_default().push(club.id);
                }
            }
        }

        // ---- Stage 3: last login, one fetch per distinct manager ----

        if wants(Category::LastLogin) && !managers.is_empty() {
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }
            progress.send(STAGE_PERCENT[2], "Fetching manager activity", &[Category::LastLogin]);

            let items: Vec<ManagerId> = managers.keys().copied().collect();
            let results = {
                let api = &self.api;
                let cancel = cancel.clone();
                run_pool(items, METADATA_FETCH_LIMIT, move |manager| {
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Ok((manager, None));
                        }
                        match api.fetch_manager_activity(manager).await {
                            Ok(activity) => Ok((manager, activity)),
                            Err(e) if e.requires_reauth() => Err(e),
                            Err(e) => {
                                debug!(manager, error = %e, "Manager activity fetch failed");
                                Ok((manager, None))
                            }
                        }
                    }
                })
                .await
            };
            let results = match results {
                Ok(r) => r,
                Err(_) => return RefreshOutcome::ReauthRequired,
            };
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }

            let now = self.clock.now();
            for (manager, activity) in results {
                let Some(activity) = activity else { continue };
                for club_id in managers.get(&manager).map(Vec::as_slice).unwrap_or(&[]) {
                    if let Some(info) = clubs.iter().find(|c| c.id == *club_id) {
                        work.commit_category(info, CategoryValue::LastLogin(activity.clone()), now);
                    }
                }
            }
        }

        // ---- Stage 4: arena detail ----

        if wants(Category::Arena) {
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }
            progress.send(STAGE_PERCENT[3], "Fetching arenas", &[Category::Arena]);

            let items: Vec<(TrackedClub, ArenaId)> = clubs
                .iter()
                .filter_map(|c| resolve_arena(c, &work).map(|arena| (c.clone(), arena)))
                .collect();

            let results = {
                let api = &self.api;
                let cancel = cancel.clone();
                run_pool(items, METADATA_FETCH_LIMIT, move |(club, arena)| {
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Ok((club, None));
                        }
                        match api.fetch_arena(arena).await {
                            Ok(report) => Ok((club, report)),
                            Err(e) if e.requires_reauth() => Err(e),
                            Err(e) => {
                                debug!(club = club.id, error = %e, "Arena fetch failed");
                                Ok((club, None))
                            }
                        }
                    }
                })
                .await
            };
            let results = match results {
                Ok(r) => r,
                Err(_) => return RefreshOutcome::ReauthRequired,
            };
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }

            let now = self.clock.now();
            for (club, report) in results {
                let Some(report) = report else { continue };
                work.commit_category(&club, CategoryValue::Arena(report), now);
            }
        }

        // ---- Stage 5: squad-derived categories, one roster fetch ----

        const SQUAD_CATEGORIES: [Category; 5] = [
            Category::Finance,
            Category::Transfers,
            Category::Tsi,
            Category::Wages,
            Category::Coach,
        ];
        let squad_panels: Vec<Category> =
            SQUAD_CATEGORIES.iter().copied().filter(|c| wants(*c)).collect();

        if !squad_panels.is_empty() {
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }
            progress.send(STAGE_PERCENT[4], "Fetching squads", &squad_panels);

            let results = {
                let api = &self.api;
                let cancel = cancel.clone();
                run_pool(clubs.clone(), SQUAD_FETCH_LIMIT, move |club| {
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Ok((club, None));
                        }
                        match api.fetch_squad(club.id).await {
                            Ok(squad) => Ok((club, squad)),
                            Err(e) if e.requires_reauth() => Err(e),
                            Err(e) => {
                                debug!(club = club.id, error = %e, "Squad fetch failed");
                                Ok((club, None))
                            }
                        }
                    }
                })
                .await
            };
            let results = match results {
                Ok(r) => r,
                Err(_) => return RefreshOutcome::ReauthRequired,
            };
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }

            let now = self.clock.now();
            let depth = self.tunables.transfer_history_depth;
            for (club, squad) in results {
                let Some(squad) = squad else { continue };
                if wants(Category::Finance) {
                    work.commit_category(&club, CategoryValue::Finance(squad.finance_estimate()), now);
                }
                if wants(Category::Transfers) {
                    work.commit_category(
                        &club,
                        CategoryValue::Transfers(squad.transfer_activity(depth)),
                        now,
                    );
                }
                if wants(Category::Tsi) {
                    work.commit_category(&club, CategoryValue::Tsi(squad.tsi_report()), now);
                }
                if wants(Category::Wages) {
                    work.commit_category(&club, CategoryValue::Wages(squad.wage_report()), now);
                }
                if wants(Category::Coach) {
                    if let Some(coach) = squad.coach.clone() {
                        work.commit_category(&club, CategoryValue::Coach(coach), now);
                    }
                }
            }
        }

        // ---- Stage 6: formations, two-level fetch ----

        if wants(Category::Formations) {
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }
            progress.send(STAGE_PERCENT[5], "Fetching match archives", &[Category::Formations]);

            let include_friendlies = self.tunables.include_friendlies;
            let lists = {
                let api = &self.api;
                let cancel = cancel.clone();
                run_pool(clubs.clone(), METADATA_FETCH_LIMIT, move |club| {
                    let cancel = cancel.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Ok((club, None));
                        }
                        match api.fetch_recent_matches(club.id, include_friendlies).await {
                            Ok(matches) => Ok((club, matches)),
                            Err(e) if e.requires_reauth() => Err(e),
                            Err(e) => {
                                debug!(club = club.id, error = %e, "Match list fetch failed");
                                Ok((club, None))
                            }
                        }
                    }
                })
                .await
            };
            let lists = match lists {
                Ok(r) => r,
                Err(_) => return RefreshOutcome::ReauthRequired,
            };
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }

            let depth = self.tunables.formation_log_depth;
            let mut pairs: Vec<(ClubId, MatchRef)> = Vec::new();
            for (club, list) in lists {
                let Some(list) = list else { continue };
                for match_ref in list.into_iter().take(depth) {
                    pairs.push((club.id, match_ref));
                }
            }

            // This can span hundreds of fetches; report per-item
            // sub-progress across the remaining percent span.
            let sub = SubProgress::new(
                progress.clone(),
                pairs.len(),
                (STAGE_PERCENT[5], STAGE_PERCENT[6]),
                vec![Category::Formations],
            );

            let details = {
                let api = &self.api;
                let cancel = cancel.clone();
                let sub = sub.clone();
                run_pool(pairs, MATCH_DETAIL_LIMIT, move |(club_id, match_ref)| {
                    let cancel = cancel.clone();
                    let sub = sub.clone();
                    async move {
                        if cancel.is_cancelled() {
                            return Ok((club_id, None));
                        }
                        let tactics = match api.fetch_match_tactics(club_id, match_ref.match_id).await
                        {
                            Ok(tactics) => tactics,
                            Err(e) if e.requires_reauth() => return Err(e),
                            Err(e) => {
                                debug!(
                                    club = club_id,
                                    match_id = match_ref.match_id,
                                    error = %e,
                                    "Match tactics fetch failed"
                                );
                                None
                            }
                        };
                        sub.tick("Fetching match details");
                        Ok((club_id, tactics))
                    }
                })
                .await
            };
            let details = match details {
                Ok(r) => r,
                Err(_) => return RefreshOutcome::ReauthRequired,
            };
            if cancel.is_cancelled() {
                return RefreshOutcome::Stopped;
            }

            let mut by_club: BTreeMap<ClubId, Vec<MatchTactics>> = BTreeMap::new();
            for (club_id, tactics) in details {
                let Some(tactics) = tactics else { continue };
                by_club.entry(club_id).or_default().push(tactics);
            }

            let now = self.clock.now();
            for (club_id, entries) in by_club {
                if let Some(info) = clubs.iter().find(|c| c.id == club_id) {
                    work.commit_category(
                        info,
                        CategoryValue::Formations(FormationLog::from_entries(entries, depth)),
                        now,
                    );
                }
            }
        }

        // ---- Stage 7: finalize and commit ----

        if cancel.is_cancelled() {
            return RefreshOutcome::Stopped;
        }
        progress.send(STAGE_PERCENT[6], "Comparing against last review", &[]);

        let now = self.clock.now();
        let result = diff::diff(
            &work,
            Some(&self.baseline),
            &categories,
            scope.clubs.as_deref(),
            now,
        );

        // Commit: the working copy becomes the visible cache in one move.
        self.cache = work;
        if let Err(e) = self.manager.save_cache(&self.cache) {
            warn!(error = %e, "Failed to persist cache");
        }

        if scope.is_full() {
            self.last_full_refresh = Some(now);
            self.note_fresh_timestamp();
            if let Err(e) = self.manager.save_refresh_marker(now) {
                warn!(error = %e, "Failed to persist refresh marker");
            }
        }

        let changed = result.has_changes();
        self.history.record(result.clone());
        if let Err(e) = self.manager.save_history(&self.history) {
            warn!(error = %e, "Failed to persist history");
        }

        // The freshly committed store becomes the comparison floor for
        // the next report.
        self.baseline = self.cache.clone();
        if let Err(e) = self.manager.save_baseline(&self.baseline) {
            warn!(error = %e, "Failed to persist baseline");
        }

        self.last_diff = Some(result);
        progress.send(100, "Up to date", &[]);
        RefreshOutcome::Completed { changed }
    }
}

fn resolve_league_unit(club: &TrackedClub, cache: &TeamCache) -> Option<LeagueUnitId> {
    club.league_unit_id
        .or_else(|| cache.record(club.id).and_then(|r| r.info.league_unit_id))
}

fn resolve_arena(club: &TrackedClub, cache: &TeamCache) -> Option<ArenaId> {
    club.arena_id
        .or_else(|| cache.record(club.id).and_then(|r| r.info.arena_id))
}
