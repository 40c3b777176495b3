//! Error types used throughout the client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Tablemate
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TablemateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Tablemate operations
pub type Result<T> = std::result::Result<T, TablemateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let err = TablemateError::Config("missing base url".to_string());
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["type"], "Config");
        assert_eq!(json["message"], "missing base url");
    }

    #[test]
    fn display_includes_category() {
        let err = TablemateError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }
}
