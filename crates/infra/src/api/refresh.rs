//! Single-flight credential refresh
//!
//! A 401 on a protected endpoint asks the [`RefreshCoordinator`] for the
//! outcome of a refresh. The first caller installs a shared future under the
//! coordinator's mutex; every caller arriving while it is pending clones and
//! awaits the same future. The future settles the coordinator itself, so the
//! slot is cleared exactly once no matter which waiter drives it.
//!
//! Each settle bumps a generation counter. A caller whose request was sent
//! before the most recent settle already raced a completed refresh; it
//! retries with the stored credential instead of starting another refresh.

use std::fmt;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Deserialize;
use tablemate_domain::Credential;
use tracing::{debug, instrument};

use super::errors::{server_message, ApiError};
use crate::http::HttpClient;

/// Outcome of one refresh, shared by every waiter
pub type RefreshOutcome = Result<Credential, ApiError>;

pub(crate) type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Obtains a new credential from the identity backend.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange `current` (possibly expired, possibly absent) for a fresh,
    /// structurally valid credential.
    ///
    /// # Errors
    /// Any error means the session cannot be recovered.
    async fn refresh(&self, current: Option<&Credential>) -> RefreshOutcome;
}

#[derive(Deserialize)]
struct RefreshResponse {
    token: Option<String>,
}

/// Refresher that calls `POST <refresh-path>` with the current bearer.
///
/// Transport failures are retried by the [`HttpClient`]; whatever reaches
/// this type as an error (exhaustion, non-2xx, a missing or malformed token)
/// is reported as [`ApiError::SessionExpired`].
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http: HttpClient,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(skip(self, current), fields(url = %self.url))]
    async fn refresh(&self, current: Option<&Credential>) -> RefreshOutcome {
        let mut request = self.http.request(Method::POST, &self.url).header(ACCEPT, "application/json");
        if let Some(credential) = current {
            request = request.bearer_auth(credential.as_str());
        }

        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| ApiError::SessionExpired(format!("refresh request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::SessionExpired(format!(
                "refresh rejected ({}): {}",
                status.as_u16(),
                server_message(&response.text())
            )));
        }

        let body: RefreshResponse = response
            .json()
            .map_err(|e| ApiError::SessionExpired(format!("refresh response unreadable: {}", e)))?;

        let token = body
            .token
            .ok_or_else(|| ApiError::SessionExpired("refresh response has no token".to_string()))?;

        let credential = Credential::parse(token).map_err(|e| {
            ApiError::SessionExpired(format!("refresh returned an invalid credential: {}", e))
        })?;

        debug!(expires_at = ?credential.expires_at(), "refresh endpoint issued a credential");
        Ok(credential)
    }
}

/// Observable state of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Result of asking the coordinator for a refresh
pub(crate) enum Join {
    /// Await this (possibly just started) refresh.
    Pending(SharedRefresh),
    /// A refresh settled after the caller's request was sent.
    Settled,
}

#[derive(Default)]
struct CoordinatorState {
    pending: Option<SharedRefresh>,
    generation: u64,
}

/// Mutex-guarded `Idle -> Refreshing -> Idle` slot
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.pending.is_some())
            .field("generation", &state.generation)
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RefreshState {
        if self.state.lock().pending.is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Number of refreshes settled so far
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Join the pending refresh, or start one with `start` if none is pending
    /// and none has settled since `observed_generation`.
    ///
    /// The check and the install happen under one lock acquisition. `start`
    /// only constructs the future; nothing runs until a waiter polls it.
    pub(crate) fn join_or_start<F>(&self, observed_generation: u64, start: F) -> Join
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let mut state = self.state.lock();

        if let Some(pending) = &state.pending {
            return Join::Pending(pending.clone());
        }
        if state.generation != observed_generation {
            return Join::Settled;
        }

        let shared = start().shared();
        state.pending = Some(shared.clone());
        Join::Pending(shared)
    }

    /// Return to `Idle`. Called by the refresh future once it has committed
    /// its outcome.
    pub(crate) fn settle(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        state.generation = state.generation.wrapping_add(1);
    }
}
