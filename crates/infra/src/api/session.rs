//! Authenticated session shared by every request of one client
//!
//! The session owns the credential store, the cookie mirror, the
//! session-ended hook and the refresh coordinator. It is cheap to clone and
//! is injected into [`ApiClient`](super::ApiClient) rather than held in a
//! global, so independent sessions can coexist in one process.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tablemate_common::auth::{
    CookieMirror, CredentialStore, MemoryCredentialStore, NoopCookieMirror, SessionCookie,
};
use tablemate_domain::constants::{COOKIE_MAX_AGE_SECS, DEFAULT_COOKIE_NAME};
use tablemate_domain::{ClientConfig, Credential};
use tracing::{debug, info, warn};

use super::errors::ApiError;
use super::refresh::{Join, RefreshCoordinator, RefreshOutcome, RefreshState, TokenRefresher};

/// Zero-argument hook fired when the session cannot be recovered
pub type SessionEndedHook = Arc<dyn Fn() + Send + Sync>;

/// Shared authentication state
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn CredentialStore>,
    mirror: Arc<dyn CookieMirror>,
    cookie: CookieSettings,
    on_session_ended: RwLock<Option<SessionEndedHook>>,
    coordinator: RefreshCoordinator,
}

#[derive(Debug, Clone)]
struct CookieSettings {
    name: String,
    max_age_secs: u64,
    secure: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie", &self.inner.cookie)
            .field("has_session_ended_hook", &self.has_session_ended_hook())
            .field("coordinator", &self.inner.coordinator)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Ephemeral session with no cookie mirror
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Re-read the stored credential and validate it.
    ///
    /// A missing, unreadable or malformed value all yield `None`: a bad
    /// credential is never sent and never fails a request on its own.
    pub async fn current_credential(&self) -> Option<Credential> {
        let raw = match self.inner.store.load().await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "Failed to read credential store");
                return None;
            }
        };

        match Credential::parse(raw) {
            Ok(credential) => Some(credential),
            Err(err) => {
                debug!(reason = %err, "Ignoring malformed stored credential");
                None
            }
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current_credential().await.is_some()
    }

    /// Best-effort expiry decoded from the current credential
    pub async fn credential_expiry(&self) -> Option<DateTime<Utc>> {
        self.current_credential().await.and_then(|c| c.expires_at())
    }

    /// Durably store `credential`, then mirror it into the session cookie.
    ///
    /// # Errors
    /// Returns `ApiError::Storage` if the durable store rejects the write.
    /// Mirror failures are logged only.
    pub async fn set_credential(&self, credential: &Credential) -> Result<(), ApiError> {
        self.inner.store.save(credential.as_str()).await?;

        let cookie = SessionCookie::new(
            self.inner.cookie.name.clone(),
            credential.as_str(),
            self.inner.cookie.max_age_secs,
            self.inner.cookie.secure,
        );
        self.mirror(&cookie);
        Ok(())
    }

    /// Remove the credential from the store and the cookie mirror.
    ///
    /// # Errors
    /// Returns `ApiError::Storage` if the durable store cannot be cleared.
    /// The cookie is removed either way.
    pub async fn clear_credential(&self) -> Result<(), ApiError> {
        let cleared = self.inner.store.clear().await;
        self.mirror(&SessionCookie::removal(self.inner.cookie.name.clone(), self.inner.cookie.secure));
        cleared.map_err(ApiError::from)
    }

    fn mirror(&self, cookie: &SessionCookie) {
        if let Err(err) = self.inner.mirror.write(cookie) {
            warn!(error = %err, cookie = %cookie.name, "Failed to mirror session cookie");
        }
    }

    /// Install (or replace) the session-ended hook.
    pub fn on_session_ended<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.on_session_ended.write() = Some(Arc::new(hook));
    }

    pub fn clear_session_ended_hook(&self) {
        *self.inner.on_session_ended.write() = None;
    }

    /// 401 recovery only runs when someone is listening for its failure.
    pub fn has_session_ended_hook(&self) -> bool {
        self.inner.on_session_ended.read().is_some()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.coordinator.state()
    }

    /// Snapshot to take before reading the credential for a request.
    pub fn refresh_generation(&self) -> u64 {
        self.inner.coordinator.generation()
    }

    /// Recover from a 401 on a request sent at `observed_generation`.
    ///
    /// Joins the pending refresh or starts one. Returns `Ok` once a valid
    /// credential is stored (or a refresh already settled since the request
    /// was sent and left a credential behind), and the refresh error
    /// otherwise. A refresh that settled by ending the session is reported
    /// as `SessionExpired` without firing the hook again.
    pub(crate) async fn recover(
        &self,
        observed_generation: u64,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<(), ApiError> {
        let join = self
            .inner
            .coordinator
            .join_or_start(observed_generation, || self.refresh_future(refresher));

        match join {
            Join::Pending(outcome) => outcome.await.map(|_| ()),
            Join::Settled => {
                if self.current_credential().await.is_none() {
                    debug!("Session ended while the request was in flight");
                    return Err(ApiError::SessionExpired(
                        "session ended while the request was in flight".to_string(),
                    ));
                }
                debug!("Refresh settled after the request was sent; retrying with stored credential");
                Ok(())
            }
        }
    }

    fn refresh_future(&self, refresher: Arc<dyn TokenRefresher>) -> BoxFuture<'static, RefreshOutcome> {
        let session = self.clone();
        async move {
            let current = session.current_credential().await;
            let outcome = match refresher.refresh(current.as_ref()).await {
                Ok(credential) => session.set_credential(&credential).await.map(|()| credential),
                Err(err) => Err(err),
            };

            match &outcome {
                Ok(credential) => {
                    session.inner.coordinator.settle();
                    info!(expires_at = ?credential.expires_at(), "Session refreshed");
                }
                Err(err) => {
                    warn!(error = %err, "Session refresh failed; ending session");
                    if let Err(clear_err) = session.clear_credential().await {
                        warn!(error = %clear_err, "Failed to clear credential after refresh failure");
                    }
                    session.inner.coordinator.settle();
                    session.fire_session_ended();
                }
            }

            outcome
        }
        .boxed()
    }

    fn fire_session_ended(&self) {
        let hook = self.inner.on_session_ended.read().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    store: Option<Arc<dyn CredentialStore>>,
    mirror: Option<Arc<dyn CookieMirror>>,
    cookie: CookieSettings,
    on_session_ended: Option<SessionEndedHook>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            store: None,
            mirror: None,
            cookie: CookieSettings {
                name: DEFAULT_COOKIE_NAME.to_string(),
                max_age_secs: COOKIE_MAX_AGE_SECS,
                secure: false,
            },
            on_session_ended: None,
        }
    }
}

impl SessionBuilder {
    /// Take cookie name, max-age and the `Secure` flag from `config`.
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.cookie = CookieSettings {
            name: config.session.cookie_name.clone(),
            max_age_secs: config.session.cookie_max_age_secs,
            secure: config.api.is_secure_origin(),
        };
        self
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cookie_mirror(mut self, mirror: Arc<dyn CookieMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie.name = name.into();
        self
    }

    pub fn secure_cookie(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    pub fn on_session_ended<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_session_ended = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                store: self.store.unwrap_or_else(|| Arc::new(MemoryCredentialStore::new())),
                mirror: self.mirror.unwrap_or_else(|| Arc::new(NoopCookieMirror)),
                cookie: self.cookie,
                on_session_ended: RwLock::new(self.on_session_ended),
                coordinator: RefreshCoordinator::new(),
            }),
        }
    }
}
