//! The sync engine: one instance owns the snapshot cache, the review
//! baseline, the update history and the tunables, with the clock and the
//! fetch API injected so independent instances are cheap to construct in
//! tests.
//!
//! All mutation funnels through the refresh pipeline in `refresh`; the
//! UI reads the cache, diff and history as immutable values and talks
//! back only through `refresh`, `cancel_handle` and the tunable setters.

pub mod pool;
mod progress;
mod refresh;

pub use progress::{CancelToken, ProgressSender, ProgressUpdate, SubProgress};

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ClubApi;
use crate::cache::store::SNAPSHOT_MAX_AGE_DAYS;
use crate::cache::{CacheManager, TeamCache};
use crate::config::Tunables;
use crate::diff::DiffResult;
use crate::history::UpdateHistory;
use crate::models::{Category, ClubId, TrackedClub};

/// Buffer size for the progress update channel.
/// Updates are droppable; a small buffer only smooths bursts.
const PROGRESS_BUFFER_SIZE: usize = 64;

/// Injectable time source; tests freeze and advance it.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used outside of tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Why the staleness scheduler is being consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    AppStart,
    FocusRegained,
    BecameVisible,
}

/// What a refresh run should cover. `None` on either axis means "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshScope {
    pub clubs: Option<Vec<ClubId>>,
    pub categories: Option<Vec<Category>>,
}

impl RefreshScope {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn clubs(ids: Vec<ClubId>) -> Self {
        Self {
            clubs: Some(ids),
            categories: None,
        }
    }

    pub fn categories(categories: Vec<Category>) -> Self {
        Self {
            clubs: None,
            categories: Some(categories),
        }
    }

    /// A single panel for one set of clubs.
    pub fn panel(ids: Vec<ClubId>, categories: Vec<Category>) -> Self {
        Self {
            clubs: Some(ids),
            categories: Some(categories),
        }
    }

    pub fn is_full(&self) -> bool {
        self.clubs.is_none() && self.categories.is_none()
    }

    pub(crate) fn selected_categories(&self) -> Vec<Category> {
        match &self.categories {
            Some(categories) => Category::ALL
                .iter()
                .copied()
                .filter(|c| categories.contains(c))
                .collect(),
            None => Category::ALL.to_vec(),
        }
    }
}

/// How a refresh run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The run committed. `changed` says whether the comparison against
    /// the review baseline found anything.
    Completed { changed: bool },
    /// User cancellation: working copy discarded, nothing committed.
    /// Informational, not an error.
    Stopped,
    /// The session token was rejected mid-run; nothing committed. The
    /// caller should surface a re-login prompt.
    ReauthRequired,
    /// A refresh was already running; this trigger was a no-op.
    AlreadyRunning,
}

pub struct Engine<A> {
    pub(crate) api: A,
    pub(crate) manager: CacheManager,
    pub(crate) tunables: Tunables,
    pub(crate) clock: Box<dyn Clock + Send + Sync>,

    pub(crate) tracked: Vec<TrackedClub>,
    pub(crate) cache: TeamCache,
    pub(crate) baseline: TeamCache,
    pub(crate) history: UpdateHistory,
    pub(crate) last_diff: Option<DiffResult>,
    pub(crate) last_full_refresh: Option<DateTime<Utc>>,

    pub(crate) refreshing: bool,
    pub(crate) cancel: CancelToken,
    pub(crate) progress_tx: Option<mpsc::Sender<ProgressUpdate>>,

    /// One staleness request per "became stale" transition.
    stale_request_made: bool,
    /// Last backfill attempt per club, for the cooldown.
    backfill_attempts: HashMap<ClubId, DateTime<Utc>>,
}

impl<A: ClubApi> Engine<A> {
    pub fn new(api: A, manager: CacheManager, tunables: Tunables) -> Self {
        Self::with_clock(api, manager, tunables, Box::new(SystemClock))
    }

    /// Construct with an injected clock, loading and pruning persisted
    /// state. Every persisted structure tolerates being missing or
    /// malformed independently.
    pub fn with_clock(
        api: A,
        manager: CacheManager,
        tunables: Tunables,
        clock: Box<dyn Clock + Send + Sync>,
    ) -> Self {
        let now = clock.now();
        let max_age = Duration::days(SNAPSHOT_MAX_AGE_DAYS);

        let mut cache = manager.load_cache();
        cache.prune(max_age, now);

        let mut baseline = manager.load_baseline();
        baseline.prune(max_age, now);

        let mut history = manager.load_history();
        history.set_retention(tunables.history_retention);

        let last_full_refresh = manager.load_refresh_marker();
        debug!(
            clubs = cache.clubs.len(),
            history = history.len(),
            ?last_full_refresh,
            "Engine state loaded"
        );

        Self {
            api,
            manager,
            tunables,
            clock,
            tracked: Vec::new(),
            cache,
            baseline,
            history,
            last_diff: None,
            last_full_refresh,
            refreshing: false,
            cancel: CancelToken::new(),
            progress_tx: None,
            stale_request_made: false,
            backfill_attempts: HashMap::new(),
        }
    }

    // =========================================================================
    // Read-only views
    // =========================================================================

    pub fn cache(&self) -> &TeamCache {
        &self.cache
    }

    pub fn baseline(&self) -> &TeamCache {
        &self.baseline
    }

    pub fn history(&self) -> &UpdateHistory {
        &self.history
    }

    pub fn last_diff(&self) -> Option<&DiffResult> {
        self.last_diff.as_ref()
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    // =========================================================================
    // Control surface
    // =========================================================================

    /// Replace the tracked club set. A membership change re-arms the
    /// staleness scheduler.
    pub fn set_tracked_clubs(&mut self, clubs: Vec<TrackedClub>) {
        if clubs != self.tracked {
            self.stale_request_made = false;
        }
        self.tracked = clubs;
    }

    pub fn tracked_clubs(&self) -> &[TrackedClub] {
        &self.tracked
    }

    /// Handle for requesting cancellation of the active refresh from
    /// outside the engine.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Open the progress stream. Replaces any previous subscription.
    pub fn subscribe_progress(&mut self) -> mpsc::Receiver<ProgressUpdate> {
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER_SIZE);
        self.progress_tx = Some(tx);
        rx
    }

    /// Freeze the review baseline at the current cache: the user has
    /// seen the comparison that was on screen.
    pub fn mark_reviewed(&mut self) {
        self.baseline = self.cache.clone();
        if let Err(e) = self.manager.save_baseline(&self.baseline) {
            warn!(error = %e, "Failed to persist baseline");
        }
    }

    pub fn set_history_retention(&mut self, retention: usize) {
        self.tunables.history_retention = retention.max(1);
        self.history.set_retention(retention);
        if let Err(e) = self.manager.save_history(&self.history) {
            warn!(error = %e, "Failed to persist history");
        }
    }

    pub fn set_staleness_threshold_days(&mut self, days: i64) {
        self.tunables.staleness_threshold_days = days.max(1);
    }

    // =========================================================================
    // Staleness scheduler
    // =========================================================================

    /// A fresh full-refresh timestamp re-arms the scheduler.
    pub(crate) fn note_fresh_timestamp(&mut self) {
        self.stale_request_made = false;
    }

    /// Whether a full refresh should start now. Consulted on app start
    /// and whenever the app regains focus or becomes visible; asks at
    /// most once per "became stale" transition.
    pub fn should_refresh_on(&mut self, wake: Wake) -> bool {
        if self.refreshing || self.stale_request_made {
            return false;
        }

        let now = self.clock.now();
        let last = match self.last_full_refresh {
            Some(t) => Some(t),
            None => {
                // No explicit marker: seed from the newest snapshot so a
                // cache restored from disk does not look ancient.
                let seeded = self.cache.latest_timestamp();
                if let Some(t) = seeded {
                    self.last_full_refresh = Some(t);
                    if let Err(e) = self.manager.save_refresh_marker(t) {
                        warn!(error = %e, "Failed to persist refresh marker");
                    }
                }
                seeded
            }
        };

        let stale = match last {
            Some(t) => now - t >= Duration::days(self.tunables.staleness_threshold_days),
            None => true,
        };

        if stale {
            info!(?wake, "Data is stale, requesting refresh");
            self.stale_request_made = true;
        }
        stale
    }

    // =========================================================================
    // Backfill
    // =========================================================================

    /// Clubs missing at least one current snapshot and not inside the
    /// per-club cooldown window.
    pub fn backfill_candidates(&self) -> Vec<ClubId> {
        let now = self.clock.now();
        let cooldown = Duration::seconds(self.tunables.backfill_cooldown_secs);

        self.tracked
            .iter()
            .filter(|club| match self.cache.record(club.id) {
                Some(record) => !record.missing_categories().is_empty(),
                None => true,
            })
            .filter(|club| match self.backfill_attempts.get(&club.id) {
                Some(last) => now - *last >= cooldown,
                None => true,
            })
            .map(|club| club.id)
            .collect()
    }

    /// Run the pipeline over incomplete clubs, if any are due.
    pub async fn backfill_incomplete(&mut self) -> Option<RefreshOutcome> {
        let candidates = self.backfill_candidates();
        if candidates.is_empty() {
            return None;
        }

        info!(clubs = candidates.len(), "Backfilling incomplete clubs");
        let now = self.clock.now();
        for id in &candidates {
            self.backfill_attempts.insert(*id, now);
        }

        Some(self.refresh(RefreshScope::clubs(candidates)).await)
    }
}
