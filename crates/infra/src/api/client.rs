//! API client with bearer attach, 401 recovery and transport retry
//!
//! Every call goes through [`ApiClient::invoke`]:
//!
//! 1. the credential is re-read from the session store before each attempt
//!    and attached only when structurally valid;
//! 2. the [`HttpClient`] retries transport failures with backoff under a
//!    per-attempt deadline;
//! 3. a 401 on a protected endpoint (when a session-ended hook is installed)
//!    joins the session's single-flight refresh and replays the call once;
//! 4. any other non-2xx status is returned as `ServerRejected`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tablemate_common::auth::{CredentialStore, FileCredentialStore, KeychainCredentialStore};
use tablemate_domain::constants::{
    DEFAULT_CREDENTIAL_FILE, DEFAULT_KEYCHAIN_ACCOUNT, DEFAULT_KEYCHAIN_SERVICE,
};
use tablemate_domain::{ClientConfig, SessionConfig};
use tracing::{debug, instrument, warn};

use super::errors::ApiError;
use super::invocation::{Invocation, UploadFile};
use super::refresh::{HttpTokenRefresher, TokenRefresher};
use super::session::{Session, SessionBuilder};
use crate::http::{HttpClient, HttpResponse, JarCookieMirror, TransportError};

/// Resilient authenticated API client
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    session: Session,
    refresher: Arc<dyn TokenRefresher>,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.api.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client for `config` with a session built from it
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the configuration is invalid or the
    /// HTTP client cannot be created, and `ApiError::Storage` if the
    /// keychain is unavailable.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::builder(config).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute one logical request.
    ///
    /// 204 (and an empty 2xx body) decode from JSON `null`, so `()`,
    /// `Option<_>` and `serde_json::Value` all accept them.
    ///
    /// # Errors
    /// - `Transport` when every attempt failed without a response
    /// - `SessionExpired` when the refresh failed, or the replay after a
    ///   successful refresh was rejected with 401 again
    /// - `ServerRejected` for any other non-2xx status
    /// - `Decode` when a 2xx body does not match `T`
    #[instrument(skip(self, invocation), fields(method = %invocation.method, endpoint = %invocation.endpoint))]
    pub async fn invoke<T: DeserializeOwned>(&self, invocation: Invocation) -> Result<T, ApiError> {
        let url = self.config.api.endpoint_url(&invocation.endpoint);
        let protected = !self.config.api.is_auth_bootstrap(&invocation.endpoint);
        let mut recovery_attempted = false;

        loop {
            let (response, generation) = self.execute(&invocation, &url).await?;

            if response.status() == StatusCode::UNAUTHORIZED
                && protected
                && self.session.has_session_ended_hook()
            {
                if recovery_attempted {
                    warn!("Request rejected again after session refresh");
                    return Err(ApiError::SessionExpired(
                        "request was rejected after the session was refreshed".to_string(),
                    ));
                }
                recovery_attempted = true;

                debug!("Received 401; recovering session");
                self.session.recover(generation, Arc::clone(&self.refresher)).await?;
                continue;
            }

            return read_response(&response);
        }
    }

    /// Multipart upload of `file` under `field_name` with the same
    /// credential, retry and recovery rules as [`invoke`](Self::invoke).
    ///
    /// # Errors
    /// See [`invoke`](Self::invoke).
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        file: UploadFile,
        field_name: &str,
    ) -> Result<T, ApiError> {
        self.invoke(Invocation::post(endpoint).multipart(field_name, file)).await
    }

    /// Execute a GET request
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.invoke(Invocation::get(endpoint)).await
    }

    /// Execute a POST request with a JSON body
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.invoke(Invocation::post(endpoint).json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.invoke(Invocation::put(endpoint).json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.invoke(Invocation::patch(endpoint).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.invoke(Invocation::delete(endpoint)).await
    }

    /// Send `invocation`, returning the response together with the refresh
    /// generation observed when the credential of the final attempt was read.
    async fn execute(
        &self,
        invocation: &Invocation,
        url: &str,
    ) -> Result<(HttpResponse, u64), ApiError> {
        let generation = AtomicU64::new(self.session.refresh_generation());
        let response = self.http.send_with(|| self.prepare(invocation, url, &generation)).await?;
        Ok((response, generation.load(Ordering::SeqCst)))
    }

    /// Build one attempt, reading the credential at the last moment.
    async fn prepare(
        &self,
        invocation: &Invocation,
        url: &str,
        generation: &AtomicU64,
    ) -> Result<RequestBuilder, TransportError> {
        let builder = invocation.apply(self.http.request(invocation.method.clone(), url))?;
        generation.store(self.session.refresh_generation(), Ordering::SeqCst);
        match self.session.current_credential().await {
            Some(credential) => Ok(builder.bearer_auth(credential.as_str())),
            None => Ok(builder),
        }
    }
}

fn read_response<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    let status = response.status();

    if status == StatusCode::NO_CONTENT {
        return decode_empty(status);
    }

    if status.is_success() {
        if response.body().iter().all(u8::is_ascii_whitespace) {
            return decode_empty(status);
        }
        return response.json().map_err(|e| ApiError::Decode(e.to_string()));
    }

    let err = ApiError::rejected(status.as_u16(), &response.text());
    debug!(status = status.as_u16(), error = %err, "Request rejected by server");
    Err(err)
}

fn decode_empty<T: DeserializeOwned>(status: StatusCode) -> Result<T, ApiError> {
    serde_json::from_value(Value::Null).map_err(|_| {
        ApiError::Decode(format!(
            "Empty response ({}), but the response type cannot be deserialized from an empty body",
            status.as_u16()
        ))
    })
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: ClientConfig,
    session: Option<Session>,
    store: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, session: None, store: None, refresher: None, user_agent: None }
    }

    /// Share an existing session (and its refresh coordination) with this
    /// client.
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Credential store for the session this builder creates.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the HTTP refresher, e.g. with a different identity backend.
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// # Errors
    /// See [`ApiClient::new`].
    pub fn build(self) -> Result<ApiClient, ApiError> {
        self.config.validate()?;

        let jar = Arc::new(Jar::default());
        let mut http = HttpClient::builder()
            .timeout(self.config.retry.timeout())
            .max_attempts(self.config.retry.max_attempts)
            .base_backoff(self.config.retry.base_backoff())
            .cookie_jar(Arc::clone(&jar));
        if let Some(agent) = self.user_agent {
            http = http.user_agent(agent);
        }
        let http = http.build()?;

        let session = match self.session {
            Some(session) => session,
            None => {
                let store = match self.store {
                    Some(store) => store,
                    None => default_store(&self.config.session)?,
                };
                let mirror = JarCookieMirror::new(jar, &self.config.api.base_url)
                    .map_err(|e| ApiError::Config(e.to_string()))?;
                SessionBuilder::default()
                    .config(&self.config)
                    .store(store)
                    .cookie_mirror(Arc::new(mirror))
                    .build()
            }
        };

        let refresher = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(HttpTokenRefresher::new(
                http.clone(),
                self.config.api.endpoint_url(&self.config.api.refresh_path),
            )),
        };

        Ok(ApiClient { http, session, refresher, config: Arc::new(self.config) })
    }
}

/// File store when a path is configured, otherwise the platform keychain
/// where one is available, otherwise a file in the user's config directory.
fn default_store(config: &SessionConfig) -> Result<Arc<dyn CredentialStore>, ApiError> {
    if let Some(path) = &config.store_path {
        return Ok(Arc::new(FileCredentialStore::new(path.clone())));
    }

    if KeychainCredentialStore::PLATFORM_BACKED {
        let store = KeychainCredentialStore::new(DEFAULT_KEYCHAIN_SERVICE, DEFAULT_KEYCHAIN_ACCOUNT)?;
        return Ok(Arc::new(store));
    }

    let path = default_credential_path().ok_or_else(|| {
        ApiError::Config(
            "No credential store configured: set session.store_path, XDG_CONFIG_HOME or HOME"
                .to_string(),
        )
    })?;
    debug!(path = %path.display(), "Using file credential store");
    Ok(Arc::new(FileCredentialStore::new(path)))
}

fn default_credential_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .filter(|dir| !dir.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
        })?;
    Some(config_dir.join(DEFAULT_CREDENTIAL_FILE))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::json;
    use tablemate_common::auth::MemoryCredentialStore;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::config::loader::tests::ENV_LOCK;

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.c2ln";

    #[derive(Debug, Deserialize, PartialEq)]
    struct Table {
        id: u32,
        seats: u32,
    }

    fn config_for(server: &MockServer) -> ClientConfig {
        let mut config = ClientConfig::for_base_url(server.uri());
        config.retry.base_backoff_ms = 5;
        config.retry.timeout_ms = 2_000;
        config
    }

    fn client_with(server: &MockServer, stored: Option<&str>) -> ApiClient {
        let store = match stored {
            Some(raw) => MemoryCredentialStore::with_credential(raw),
            None => MemoryCredentialStore::new(),
        };
        ApiClient::builder(config_for(server)).store(Arc::new(store)).build().expect("api client")
    }

    #[tokio::test]
    async fn get_attaches_bearer_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tables/1"))
            .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "seats": 4 })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(&server, Some(TOKEN));
        let table: Table = client.get("/tables/1").await.unwrap();
        assert_eq!(table, Table { id: 1, seats: 4 });
    }

    #[tokio::test]
    async fn malformed_credential_is_not_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_with(&server, Some("two.segments"));
        let _: Vec<Table> = client.get("/tables").await.unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn no_content_decodes_as_unit() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/reservations/9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(&server, Some(TOKEN));
        let () = client.delete("/reservations/9").await.unwrap();
    }

    #[tokio::test]
    async fn no_content_into_struct_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

        let client = client_with(&server, None);
        let err = client.get::<Table>("/tables/1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn server_rejection_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({ "error": { "message": "Party size exceeds table" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(&server, Some(TOKEN));
        let err = client.post::<_, Value>("/reservations", &json!({ "seats": 40 })).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::ServerRejected { status: 422, message: "Party size exceeds table".into() }
        );
    }

    #[tokio::test]
    async fn unauthorized_without_hook_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/menu"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_with(&server, Some(TOKEN));
        let err = client.get::<Value>("/menu").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = ClientConfig::for_base_url("not a url");
        let err = ApiClient::builder(config)
            .store(Arc::new(MemoryCredentialStore::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[tokio::test]
    async fn per_attempt_timeout_surfaces_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.retry.max_attempts = 2;
        config.retry.timeout_ms = 100;
        let client =
            ApiClient::builder(config).store(Arc::new(MemoryCredentialStore::new())).build().unwrap();

        let err = client.get::<Value>("/analytics/daily").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { attempts: 2, .. }), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[test]
    fn credential_path_prefers_xdg_config_home() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        let home = std::env::var_os("HOME");

        std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg");
        std::env::set_var("HOME", "/home/host");
        assert_eq!(
            default_credential_path(),
            Some(PathBuf::from("/tmp/xdg/tablemate/credential.json"))
        );

        std::env::set_var("XDG_CONFIG_HOME", "");
        assert_eq!(
            default_credential_path(),
            Some(PathBuf::from("/home/host/.config/tablemate/credential.json"))
        );

        std::env::remove_var("XDG_CONFIG_HOME");
        match home {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "windows")))]
    #[tokio::test]
    async fn default_store_without_keychain_is_a_durable_file() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        let dir = tempfile::TempDir::new().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());

        let client = ApiClient::new(ClientConfig::for_base_url("http://127.0.0.1:9")).unwrap();
        std::env::remove_var("XDG_CONFIG_HOME");
        let credential = tablemate_domain::Credential::parse(TOKEN).unwrap();
        client.session().set_credential(&credential).await.unwrap();

        let reopened = FileCredentialStore::new(dir.path().join("tablemate/credential.json"));
        assert_eq!(reopened.load().await.unwrap().as_deref(), Some(TOKEN));
    }
}
