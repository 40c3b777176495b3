//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! building a client from it.

use std::path::PathBuf;

use tablemate_domain::{Credential, TablemateError};
use tablemate_infra::{config, ApiClient};
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write config file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "tablemate.json",
        r#"{
            "api": {
                "base_url": "https://api.tablemate.test/v1",
                "refresh_path": "/auth/refresh"
            },
            "retry": { "max_attempts": 5, "base_backoff_ms": 250, "timeout_ms": 8000 },
            "session": { "cookie_name": "tm_session", "cookie_max_age_secs": 3600 }
        }"#,
    );

    let config = config::load_from_file(Some(path)).expect("Failed to load config from JSON file");

    assert_eq!(config.api.base_url, "https://api.tablemate.test/v1");
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_backoff_ms, 250);
    assert_eq!(config.retry.timeout_ms, 8000);
    assert_eq!(config.session.cookie_name, "tm_session");
    assert_eq!(config.session.cookie_max_age_secs, 3600);
    // Omitted fields keep their defaults
    assert!(config.api.is_auth_bootstrap("/auth/login"));
    assert_eq!(config.session.store_path, None);
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "tablemate.toml",
        r#"
[api]
base_url = "http://localhost:4000"
auth_exempt_prefixes = ["/auth/", "/public/"]

[retry]
max_attempts = 1

[session]
store_path = "/var/lib/tablemate/credential"
"#,
    );

    let config = config::load_from_file(Some(path)).expect("Failed to load config from TOML file");

    assert_eq!(config.api.base_url, "http://localhost:4000");
    assert!(config.api.is_auth_bootstrap("/public/menu"));
    assert!(!config.api.is_secure_origin());
    assert_eq!(config.retry.max_attempts, 1);
    assert_eq!(config.retry.timeout_ms, 30_000);
    assert_eq!(config.session.store_path, Some(PathBuf::from("/var/lib/tablemate/credential")));
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/tablemate.json".into()));
    assert!(matches!(result, Err(TablemateError::Config(msg)) if msg.contains("not found")));
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "tablemate.json",
        r#"{ "api": { "base_url": "ftp://files.tablemate.test" } }"#,
    );

    let result = config::load_from_file(Some(path));
    assert!(matches!(result, Err(TablemateError::Config(msg)) if msg.contains("http or https")));
}

#[test]
fn test_load_config_rejects_malformed_toml() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "tablemate.toml", "[api\nbase_url = ");

    let result = config::load_from_file(Some(path));
    assert!(matches!(result, Err(TablemateError::Config(msg)) if msg.contains("Invalid TOML")));
}

#[tokio::test]
async fn test_client_from_file_config_persists_credential() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store_path = dir.path().join("credential");
    let path = write_config(
        &dir,
        "tablemate.json",
        &format!(
            r#"{{ "api": {{ "base_url": "http://127.0.0.1:9" }}, "session": {{ "store_path": {} }} }}"#,
            serde_json::to_string(&store_path).expect("path as json")
        ),
    );

    let config = config::load_from_file(Some(path)).expect("config loads");
    let client = ApiClient::new(config).expect("client builds");

    let credential: Credential = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.c2ln".parse().expect("valid credential");
    client.session().set_credential(&credential).await.expect("credential saved");

    let persisted = std::fs::read_to_string(&store_path).expect("credential file");
    assert!(persisted.contains("eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.c2ln"));

    client.session().clear_credential().await.expect("credential cleared");
    assert!(!client.session().is_authenticated().await);
}
