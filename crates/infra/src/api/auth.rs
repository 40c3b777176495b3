//! Authentication flows that set and clear the session credential
//!
//! Every endpoint here is auth-bootstrap, so a 401 from any of them is
//! returned to the caller instead of triggering a refresh.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tablemate_domain::Credential;
use tracing::{info, instrument, warn};

use super::client::ApiClient;
use super::errors::ApiError;

const LOGIN_PATH: &str = "/auth/login";
const VERIFY_TWO_FACTOR_PATH: &str = "/auth/2fa/verify";
const LOGOUT_PATH: &str = "/auth/logout";
const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Result of a password login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A credential was issued and stored.
    Authenticated,
    /// The account needs a second factor; pass the challenge to
    /// [`AuthService::verify_two_factor`].
    TwoFactorRequired { challenge_token: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthResponse {
    token: Option<String>,
    requires_two_factor: bool,
    challenge_token: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct TwoFactorRequest<'a> {
    challenge_token: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    password: &'a str,
}

/// Login, 2FA, logout and password reset over an [`ApiClient`]
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Log in with email and password.
    ///
    /// # Errors
    /// `ServerRejected` for bad credentials, `InvalidCredential` if the
    /// server issues a malformed token, `Storage` if it cannot be stored.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let response: AuthResponse =
            self.client.post(LOGIN_PATH, &LoginRequest { email, password }).await?;

        if response.requires_two_factor {
            let challenge_token = response.challenge_token.ok_or_else(|| {
                ApiError::Decode("two-factor login response has no challenge_token".to_string())
            })?;
            info!("Login requires a second factor");
            return Ok(LoginOutcome::TwoFactorRequired { challenge_token });
        }

        self.store_token(response.token).await?;
        info!("Logged in");
        Ok(LoginOutcome::Authenticated)
    }

    /// Complete a two-factor login.
    ///
    /// # Errors
    /// As for [`login`](Self::login).
    #[instrument(skip_all)]
    pub async fn verify_two_factor(&self, challenge_token: &str, code: &str) -> Result<(), ApiError> {
        let response: AuthResponse = self
            .client
            .post(VERIFY_TWO_FACTOR_PATH, &TwoFactorRequest { challenge_token, code })
            .await?;

        self.store_token(response.token).await?;
        info!("Two-factor verification complete");
        Ok(())
    }

    /// Tell the server, then clear the credential whatever it said.
    ///
    /// # Errors
    /// Only a failure to clear the local store is returned.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Err(err) = self.client.post::<_, Value>(LOGOUT_PATH, &json!({})).await {
            warn!(error = %err, "Logout request failed; clearing local session anyway");
        }
        self.client.session().clear_credential().await?;
        info!("Logged out");
        Ok(())
    }

    /// # Errors
    /// Returns the server's rejection or a transport error.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let _: Value = self.client.post(FORGOT_PASSWORD_PATH, &json!({ "email": email })).await?;
        Ok(())
    }

    /// # Errors
    /// Returns the server's rejection or a transport error.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        let _: Value = self
            .client
            .post(RESET_PASSWORD_PATH, &ResetPasswordRequest { token, password: new_password })
            .await?;
        Ok(())
    }

    async fn store_token(&self, token: Option<String>) -> Result<(), ApiError> {
        let token = token.ok_or_else(|| {
            ApiError::InvalidCredential("authentication response has no token".to_string())
        })?;
        let credential = Credential::parse(token)?;
        self.client.session().set_credential(&credential).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tablemate_common::auth::MemoryCredentialStore;
    use tablemate_domain::ClientConfig;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.c2ln";

    fn service(server: &MockServer, store: Arc<MemoryCredentialStore>) -> AuthService {
        let mut config = ClientConfig::for_base_url(server.uri());
        config.retry.base_backoff_ms = 5;
        AuthService::new(ApiClient::builder(config).store(store).build().unwrap())
    }

    #[tokio::test]
    async fn login_stores_issued_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "email": "chef@bistro.test", "password": "s3cret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": TOKEN })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let auth = service(&server, store.clone());

        let outcome = auth.login("chef@bistro.test", "s3cret").await.unwrap();
        assert_eq!(outcome, LoginOutcome::Authenticated);
        assert_eq!(store.snapshot().as_deref(), Some(TOKEN));
    }

    #[tokio::test]
    async fn login_with_second_factor_returns_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "requires_two_factor": true, "challenge_token": "chal-1" }),
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/2fa/verify"))
            .and(body_json(json!({ "challenge_token": "chal-1", "code": "123456" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": TOKEN })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let auth = service(&server, store.clone());

        let outcome = auth.login("chef@bistro.test", "s3cret").await.unwrap();
        assert_eq!(outcome, LoginOutcome::TwoFactorRequired { challenge_token: "chal-1".into() });
        assert_eq!(store.snapshot(), None);

        auth.verify_two_factor("chal-1", "123456").await.unwrap();
        assert_eq!(store.snapshot().as_deref(), Some(TOKEN));
    }

    #[tokio::test]
    async fn malformed_login_token_is_invalid_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc" })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let err = service(&server, store.clone()).login("a@b.test", "pw").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredential(_)));
        assert_eq!(store.snapshot(), None);
    }

    #[tokio::test]
    async fn logout_clears_even_when_server_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::with_credential(TOKEN));
        service(&server, store.clone()).logout().await.unwrap();
        assert_eq!(store.snapshot(), None);
    }

    #[tokio::test]
    async fn password_reset_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/forgot-password"))
            .and(body_json(json!({ "email": "host@bistro.test" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/reset-password"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": { "message": "Reset link expired" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let auth = service(&server, Arc::new(MemoryCredentialStore::new()));
        auth.request_password_reset("host@bistro.test").await.unwrap();

        let err = auth.reset_password("reset-tok", "n3w").await.unwrap_err();
        assert_eq!(err.to_string(), "Reset link expired");
    }
}
