use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tablemate_common::resilience::Backoff;
use tablemate_domain::{RetryConfig, TablemateError};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Every attempt failed with a transient error (connect, DNS, timeout).
    #[error("request failed after {attempts} attempt(s): {reason}")]
    Exhausted { attempts: u32, reason: String },

    /// The request could not be built or failed in a way retrying won't fix.
    #[error("request could not be sent: {0}")]
    Request(String),
}

/// A response whose body was read in full within the attempt deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, replacing invalid sequences
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    /// Returns the `serde_json` error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client with a per-attempt deadline and retry of transport failures.
///
/// The deadline covers the whole exchange, headers and body. Only failures
/// that produced no complete response are retried. Any complete response,
/// whatever its status, is handed back to the caller.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    backoff: Backoff,
    timeout: Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("backoff", &self.backoff)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TablemateError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute a clonable request builder with retry semantics.
    ///
    /// # Errors
    /// Returns [`TransportError::Request`] if the body cannot be cloned for
    /// retries, and [`TransportError::Exhausted`] when no attempt got a
    /// response.
    pub async fn send(&self, builder: RequestBuilder) -> Result<HttpResponse, TransportError> {
        self.send_with(|| {
            let attempt = builder.try_clone().ok_or_else(|| {
                TransportError::Request(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            });
            async move { attempt }
        })
        .await
    }

    /// Execute a request produced by `make_request`, rebuilding it for every
    /// attempt.
    ///
    /// Each attempt (sending, waiting for headers, reading the body) runs
    /// under the configured timeout; an attempt that hits the deadline is
    /// dropped and counted as a transient failure. Between
    /// failures the client sleeps `base × attempt`.
    ///
    /// # Errors
    /// Returns [`TransportError::Exhausted`] once `max_attempts` attempts
    /// failed transiently, or [`TransportError::Request`] for a permanent
    /// failure or an error from `make_request`.
    pub async fn send_with<F, Fut>(&self, mut make_request: F) -> Result<HttpResponse, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RequestBuilder, TransportError>>,
    {
        let mut attempt: u32 = 1;

        loop {
            let request = make_request()
                .await?
                .build()
                .map_err(|err| TransportError::Request(err.to_string()))?;

            let method = request.method().clone();
            let url = request.url().clone();
            debug!(attempt, %method, %url, "sending HTTP request");

            let reason = match tokio::time::timeout(self.timeout, self.fetch(request)).await {
                Ok(Ok(response)) => {
                    let status = response.status();
                    debug!(attempt, %method, %url, %status, "received HTTP response");
                    return Ok(response);
                }
                Ok(Err(err)) if should_retry_error(&err) => err.to_string(),
                Ok(Err(err)) => {
                    debug!(attempt, %method, %url, error = %err, "HTTP request failed");
                    return Err(TransportError::Request(err.to_string()));
                }
                Err(_) => format!("attempt timed out after {}ms", self.timeout.as_millis()),
            };

            if !self.backoff.allows_retry_after(attempt) {
                warn!(attempt, %method, %url, error = %reason, "HTTP retries exhausted");
                return Err(TransportError::Exhausted { attempts: attempt, reason });
            }

            warn!(attempt, %method, %url, error = %reason, "transient HTTP failure, retrying");
            self.backoff.wait(attempt).await;
            attempt += 1;
        }
    }

    async fn fetch(&self, request: Request) -> Result<HttpResponse, reqwest::Error> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, headers, body: body.to_vec() })
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
    cookie_jar: Option<Arc<Jar>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl HttpClientBuilder {
    /// Seed timeout and retry settings from a [`RetryConfig`].
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
            base_backoff: config.base_backoff(),
            user_agent: None,
            default_headers: None,
            cookie_jar: None,
        }
    }

    /// Deadline for a single attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Share a cookie jar with the transport so cookies written to it are
    /// sent with every request.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    pub fn build(self) -> Result<HttpClient, TablemateError> {
        let mut builder = ReqwestClient::builder().no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        if let Some(jar) = self.cookie_jar {
            builder = builder.cookie_provider(jar);
        }

        let client = builder
            .build()
            .map_err(|err| TablemateError::Config(format!("Failed to build HTTP client: {}", err)))?;

        Ok(HttpClient {
            client,
            backoff: Backoff::new(self.base_backoff, self.max_attempts),
            timeout: self.timeout,
        })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    // A connection dropped mid-body surfaces as a body error.
    if err.is_timeout() || err.is_request() || err.is_body() {
        return true;
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return true;
        }
    }
    false
}
