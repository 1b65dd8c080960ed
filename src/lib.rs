//! clubwatch - snapshot cache and change tracking for Hattrick club data.
//!
//! For a set of tracked clubs, the engine maintains a local snapshot
//! cache across eleven data categories, refreshes it on demand or when
//! the data goes stale, and reports field-level changes by diffing cache
//! states. Fetches run through a bounded worker pool against the
//! rate-limited game API; a refresh commits atomically or not at all.
//!
//! Rendering, localization and token acquisition live outside this
//! crate: the UI reads the cache, diff and history as plain values and
//! drives the engine through [`Engine::refresh`], a cancellation handle
//! and a progress channel.

pub mod api;
pub mod cache;
pub mod config;
pub mod diff;
pub mod engine;
pub mod history;
pub mod models;
pub mod utils;

pub use api::{ClubApi, FetchError, FetchResult, HttpClubApi};
pub use cache::{CacheManager, CategorySlot, CategoryValue, ClubRecord, Snapshot, TeamCache};
pub use config::Tunables;
pub use diff::{diff, ChangeField, ClubChangeSet, DiffResult};
pub use engine::{
    CancelToken, Clock, Engine, ProgressUpdate, RefreshOutcome, RefreshScope, SystemClock, Wake,
};
pub use history::{HistoryEntry, UpdateHistory};
pub use models::{Category, ClubId, TrackedClub};
