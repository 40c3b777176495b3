//! Client constants
//!
//! Centralized location for the defaults shared by the config layer, the
//! session and the HTTP client.

// API defaults
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Endpoints that never trigger 401 recovery. The configured refresh path is
/// always exempt in addition to these.
pub const AUTH_BOOTSTRAP_PREFIXES: &[&str] = &[
    "/auth/login",
    "/auth/logout",
    "/auth/refresh",
    "/auth/2fa",
    "/auth/password-reset",
    "/auth/forgot-password",
    "/auth/reset-password",
];

// Retry defaults (total attempts, not retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

// Credential mirror
pub const DEFAULT_COOKIE_NAME: &str = "tablemate_token";
pub const COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Tablemate.api";
pub const DEFAULT_KEYCHAIN_ACCOUNT: &str = "session";
/// Credential file under `$XDG_CONFIG_HOME` (or `~/.config`) when no keychain
/// backend is available and no store path is configured
pub const DEFAULT_CREDENTIAL_FILE: &str = "tablemate/credential.json";

/// Message used when a rejected response carries no `{ error: { message } }`
/// envelope.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";
