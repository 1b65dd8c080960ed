//! Fetch interface for club data categories.
//!
//! The engine consumes the [`ClubApi`] trait: one async fetch per category
//! group, each returning parsed data, absence, or a [`FetchError`]. The
//! concrete [`HttpClubApi`] lives in `client`; tests substitute their own
//! implementations.

mod client;
mod error;

pub use client::HttpClubApi;
pub use error::FetchError;

use std::future::Future;

use crate::models::{
    ArenaId, ArenaReport, ClubDetails, ClubId, LeaguePerformance, LeagueUnitId, ManagerActivity,
    ManagerId, MatchId, MatchRef, MatchTactics, Squad,
};

/// `Ok(None)` means the resource is genuinely absent (e.g. a club that
/// never wrote a press announcement), which is not a failure.
pub type FetchResult<T> = Result<Option<T>, FetchError>;

/// Read-only access to the game API, one method per fetch endpoint.
///
/// Implementations are expected to be cheap to share by reference; the
/// refresh pipeline borrows one instance across all in-flight fetches.
pub trait ClubApi {
    /// Identity, press announcement, fan club and arena routing metadata
    /// in a single fetch.
    fn fetch_club_details(
        &self,
        club: ClubId,
    ) -> impl Future<Output = FetchResult<ClubDetails>> + Send;

    /// The club's standing in its league series.
    fn fetch_league_performance(
        &self,
        club: ClubId,
        league_unit: LeagueUnitId,
    ) -> impl Future<Output = FetchResult<LeaguePerformance>> + Send;

    /// Last-login data for a manager account. One fetch serves every
    /// tracked club run by that manager.
    fn fetch_manager_activity(
        &self,
        manager: ManagerId,
    ) -> impl Future<Output = FetchResult<ManagerActivity>> + Send;

    /// Arena detail (capacity, construction state).
    fn fetch_arena(&self, arena: ArenaId) -> impl Future<Output = FetchResult<ArenaReport>> + Send;

    /// Full roster; finance, transfers, TSI, wages and coach are all
    /// derived from this one response.
    fn fetch_squad(&self, club: ClubId) -> impl Future<Output = FetchResult<Squad>> + Send;

    /// Recent match archive for a club.
    fn fetch_recent_matches(
        &self,
        club: ClubId,
        include_friendlies: bool,
    ) -> impl Future<Output = FetchResult<Vec<MatchRef>>> + Send;

    /// Formation and tactic the club used in one match.
    fn fetch_match_tactics(
        &self,
        club: ClubId,
        match_id: MatchId,
    ) -> impl Future<Output = FetchResult<MatchTactics>> + Send;
}
