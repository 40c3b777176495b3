//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `TABLEMATE_API_BASE_URL` is absent, falls back to loading from file
//! 3. Searches multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! The result is validated before it is returned.
//!
//! ## Environment Variables
//! - `TABLEMATE_API_BASE_URL`: API base URL (required)
//! - `TABLEMATE_REFRESH_PATH`: Refresh endpoint path
//! - `TABLEMATE_RETRY_MAX_ATTEMPTS`: Total attempts per request
//! - `TABLEMATE_RETRY_BASE_BACKOFF_MS`: Backoff base in milliseconds
//! - `TABLEMATE_REQUEST_TIMEOUT_MS`: Per-attempt timeout in milliseconds
//! - `TABLEMATE_COOKIE_NAME`: Name of the mirrored session cookie
//! - `TABLEMATE_CREDENTIAL_STORE_PATH`: Credential file (keychain if unset)
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./tablemate.{json,toml}` or `./config.{json,toml}` (current working directory)
//! 2. `../tablemate.{json,toml}` (parent directory)
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tablemate_domain::{ClientConfig, Result, TablemateError};

const CONFIG_FILE_NAMES: &[&str] =
    &["tablemate.json", "tablemate.toml", "config.json", "config.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `TablemateError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded values fail validation
pub fn load() -> Result<ClientConfig> {
    // Try loading from environment first
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            // Fall back to file
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `TABLEMATE_API_BASE_URL` is required; every other variable overrides
/// the corresponding default when set.
///
/// # Errors
/// Returns `TablemateError::Config` if the base URL is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::for_base_url(env_var("TABLEMATE_API_BASE_URL")?);

    if let Some(path) = env_opt("TABLEMATE_REFRESH_PATH") {
        config.api.refresh_path = path;
    }
    if let Some(attempts) = env_parse::<u32>("TABLEMATE_RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
    }
    if let Some(backoff) = env_parse::<u64>("TABLEMATE_RETRY_BASE_BACKOFF_MS")? {
        config.retry.base_backoff_ms = backoff;
    }
    if let Some(timeout) = env_parse::<u64>("TABLEMATE_REQUEST_TIMEOUT_MS")? {
        config.retry.timeout_ms = timeout;
    }
    if let Some(name) = env_opt("TABLEMATE_COOKIE_NAME") {
        config.session.cookie_name = name;
    }
    if let Some(path) = env_opt("TABLEMATE_CREDENTIAL_STORE_PATH") {
        config.session.store_path = Some(PathBuf::from(path));
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TablemateError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or values fail validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TablemateError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => search_config_paths().ok_or_else(|| {
            TablemateError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TablemateError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`). Missing
/// sections and fields take their defaults.
///
/// # Errors
/// Returns `TablemateError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TablemateError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TablemateError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(TablemateError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Search multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn search_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `TablemateError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        TablemateError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Optional environment variable; empty counts as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                TablemateError::Config(format!("Invalid value for {}: {}", key, e))
            })
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
