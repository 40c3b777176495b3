//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    AUTH_BOOTSTRAP_PREFIXES, COOKIE_MAX_AGE_SECS, DEFAULT_API_BASE_URL, DEFAULT_BASE_BACKOFF_MS,
    DEFAULT_COOKIE_NAME, DEFAULT_MAX_ATTEMPTS, DEFAULT_REFRESH_PATH, DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::errors::{Result, TablemateError};

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    pub refresh_path: String,
    /// Path prefixes exempt from 401 recovery
    pub auth_exempt_prefixes: Vec<String>,
}

/// Transport retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    /// Deadline for a single attempt
    pub timeout_ms: u64,
}

/// Credential persistence configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_max_age_secs: u64,
    /// Durable credential file; `None` keeps the credential in the keychain
    pub store_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            auth_exempt_prefixes: AUTH_BOOTSTRAP_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_max_age_secs: COOKIE_MAX_AGE_SECS,
            store_path: None,
        }
    }
}

impl ApiConfig {
    /// Config pointing at `base_url` with every other field defaulted
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Join an endpoint path onto the base URL.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Whether `endpoint` is an auth-bootstrap endpoint (login, logout,
    /// refresh, 2FA, password reset) that must never enter refresh recovery.
    #[must_use]
    pub fn is_auth_bootstrap(&self, endpoint: &str) -> bool {
        let path = normalize_path(endpoint);

        matches_prefix(&path, &normalize_path(&self.refresh_path))
            || self
                .auth_exempt_prefixes
                .iter()
                .any(|prefix| matches_prefix(&path, &normalize_path(prefix)))
    }

    /// `true` when the API origin is served over HTTPS
    #[must_use]
    pub fn is_secure_origin(&self) -> bool {
        Url::parse(&self.base_url).map(|url| url.scheme() == "https").unwrap_or(false)
    }
}

impl RetryConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}

impl ClientConfig {
    /// Defaults with the given API base URL
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self { api: ApiConfig::with_base_url(base_url), ..Self::default() }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `TablemateError::Config` when the base URL is not an absolute
    /// http(s) URL, the refresh path or cookie name is empty, the retry
    /// settings would never attempt a request, or the backoff base is zero.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api.base_url).map_err(|e| {
            TablemateError::Config(format!("Invalid API base URL '{}': {}", self.api.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TablemateError::Config(format!(
                "API base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.api.refresh_path.trim().is_empty() {
            return Err(TablemateError::Config("Refresh path must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(TablemateError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.retry.base_backoff_ms == 0 {
            return Err(TablemateError::Config(
                "base_backoff_ms must be greater than 0".to_string(),
            ));
        }
        if self.retry.timeout_ms == 0 {
            return Err(TablemateError::Config("timeout_ms must be greater than 0".to_string()));
        }
        let cookie_name_valid = !self.session.cookie_name.is_empty()
            && self
                .session
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
        if !cookie_name_valid {
            return Err(TablemateError::Config(format!(
                "Invalid cookie name '{}'",
                self.session.cookie_name
            )));
        }
        Ok(())
    }
}

/// `path` is `prefix` itself or lies below it on a segment boundary, so
/// `/auth/refresh` covers `/auth/refresh/rotate` but not `/auth/refresh-history`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix.ends_with('/') {
        return path.starts_with(prefix) || path == prefix.trim_end_matches('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn normalize_path(endpoint: &str) -> String {
    let path = endpoint.split(|c| c == '?' || c == '#').next().unwrap_or_default();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.session.cookie_max_age_secs, 604_800);
        assert_eq!(config.api.refresh_path, "/auth/refresh");
    }

    #[test]
    fn endpoint_url_joins_single_slash() {
        let api = ApiConfig::with_base_url("https://api.tablemate.test/v1/");
        assert_eq!(api.endpoint_url("/menu"), "https://api.tablemate.test/v1/menu");
        assert_eq!(api.endpoint_url("menu/items"), "https://api.tablemate.test/v1/menu/items");
    }

    #[test]
    fn bootstrap_endpoints_are_exempt() {
        let api = ApiConfig::default();
        assert!(api.is_auth_bootstrap("/auth/login"));
        assert!(api.is_auth_bootstrap("auth/logout"));
        assert!(api.is_auth_bootstrap("/auth/refresh?rotate=true"));
        assert!(api.is_auth_bootstrap("/auth/2fa/verify"));
        assert!(api.is_auth_bootstrap("/auth/forgot-password"));
        assert!(!api.is_auth_bootstrap("/menu"));
        assert!(!api.is_auth_bootstrap("/reservations/auth/login"));
    }

    #[test]
    fn prefixes_match_on_segment_boundaries() {
        let api = ApiConfig::default();
        assert!(api.is_auth_bootstrap("/auth/refresh/"));
        assert!(api.is_auth_bootstrap("/auth/2fa/verify"));
        assert!(!api.is_auth_bootstrap("/auth/refresh-history"));
        assert!(!api.is_auth_bootstrap("/auth/login-attempts?page=2"));
        assert!(!api.is_auth_bootstrap("/auth/2factor"));

        let api = ApiConfig {
            auth_exempt_prefixes: vec!["/public/".to_string()],
            ..ApiConfig::default()
        };
        assert!(api.is_auth_bootstrap("/public/menu"));
        assert!(api.is_auth_bootstrap("/public"));
        assert!(!api.is_auth_bootstrap("/publications"));
    }

    #[test]
    fn custom_refresh_path_is_always_exempt() {
        let api = ApiConfig {
            refresh_path: "/session/renew".to_string(),
            auth_exempt_prefixes: Vec::new(),
            ..ApiConfig::default()
        };
        assert!(api.is_auth_bootstrap("/session/renew"));
        assert!(!api.is_auth_bootstrap("/auth/login"));
    }

    #[test]
    fn secure_origin_follows_scheme() {
        assert!(ApiConfig::with_base_url("https://api.tablemate.test").is_secure_origin());
        assert!(!ApiConfig::with_base_url("http://localhost:8080").is_secure_origin());
        assert!(!ApiConfig::with_base_url("not a url").is_secure_origin());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ClientConfig::for_base_url("ftp://files.tablemate.test");
        assert!(matches!(config.validate(), Err(TablemateError::Config(_))));

        config = ClientConfig::for_base_url("relative/path");
        assert!(config.validate().is_err());

        config = ClientConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        config = ClientConfig::default();
        config.session.cookie_name = "bad name;".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_backoff_base() {
        let mut config = ClientConfig::default();
        config.retry.base_backoff_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(TablemateError::Config(msg)) if msg.contains("base_backoff_ms")
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "api": { "base_url": "https://x.test" } }"#).unwrap();
        assert_eq!(config.api.base_url, "https://x.test");
        assert_eq!(config.api.refresh_path, "/auth/refresh");
        assert_eq!(config.retry, RetryConfig::default());
    }
}
