//! HTTP client for the Hattrick data gateway.
//!
//! Token acquisition is the caller's problem; this client only attaches
//! a bearer token to requests and maps response statuses onto the fetch
//! error taxonomy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::{
    ArenaId, ArenaReport, ClubDetails, ClubId, LeaguePerformance, LeagueUnitId, ManagerActivity,
    ManagerId, MatchId, MatchRef, MatchTactics, Squad,
};

use super::{ClubApi, FetchError, FetchResult};

/// Base URL for the data gateway
const DEFAULT_BASE_URL: &str = "https://chpp-gateway.hattrick.org/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Gateway client for club data.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpClubApi {
    client: Client,
    base_url: String,
    token: Option<Arc<String>>,
}

impl HttpClubApi {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(Arc::new(token.into()));
    }

    /// Create a client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(Arc::new(token.into())),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> FetchResult<T> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.get(&url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        // A missing resource is absence, not a failure: some clubs simply
        // have no press announcement, no recent transfers, etc.
        if status == StatusCode::NOT_FOUND {
            debug!(%url, "Resource absent");
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, &body));
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        Ok(Some(parsed))
    }
}

impl ClubApi for HttpClubApi {
    fn fetch_club_details(
        &self,
        club: ClubId,
    ) -> impl Future<Output = FetchResult<ClubDetails>> + Send {
        async move { self.get(&format!("/clubs/{}/details", club)).await }
    }

    fn fetch_league_performance(
        &self,
        club: ClubId,
        league_unit: LeagueUnitId,
    ) -> impl Future<Output = FetchResult<LeaguePerformance>> + Send {
        async move {
            self.get(&format!("/series/{}/standings/{}", league_unit, club))
                .await
        }
    }

    fn fetch_manager_activity(
        &self,
        manager: ManagerId,
    ) -> impl Future<Output = FetchResult<ManagerActivity>> + Send {
        async move { self.get(&format!("/managers/{}/activity", manager)).await }
    }

    fn fetch_arena(&self, arena: ArenaId) -> impl Future<Output = FetchResult<ArenaReport>> + Send {
        async move { self.get(&format!("/arenas/{}", arena)).await }
    }

    fn fetch_squad(&self, club: ClubId) -> impl Future<Output = FetchResult<Squad>> + Send {
        async move { self.get(&format!("/clubs/{}/squad", club)).await }
    }

    fn fetch_recent_matches(
        &self,
        club: ClubId,
        include_friendlies: bool,
    ) -> impl Future<Output = FetchResult<Vec<MatchRef>>> + Send {
        async move {
            self.get(&format!(
                "/clubs/{}/matches?friendlies={}",
                club, include_friendlies
            ))
            .await
        }
    }

    fn fetch_match_tactics(
        &self,
        club: ClubId,
        match_id: MatchId,
    ) -> impl Future<Output = FetchResult<MatchTactics>> + Send {
        async move {
            self.get(&format!("/matches/{}/tactics/{}", match_id, club))
                .await
        }
    }
}
