//! Durable credential store abstraction
//!
//! The session re-reads the store before every request attempt, so a store
//! shared with another process (or another client instance) is observed
//! without any explicit notification. Stores persist the raw string exactly
//! as given; validation happens on read in the session.

use async_trait::async_trait;
use tablemate_domain::TablemateError;
use thiserror::Error;

/// Error type for credential store and cookie mirror operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("credential store I/O failed: {0}")]
    Io(String),

    #[error("credential store contents are corrupt: {0}")]
    Corrupt(String),

    #[error("keychain access failed: {0}")]
    Keychain(String),

    #[error("cookie mirror write failed: {0}")]
    Mirror(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl From<StoreError> for TablemateError {
    fn from(err: StoreError) -> Self {
        TablemateError::Storage(err.to_string())
    }
}

/// Trait for durable credential storage
///
/// This trait abstracts the persistence backend to enable testing with
/// in-memory implementations and to support file or keychain storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve the stored credential string, if any
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    async fn load(&self) -> Result<Option<String>, StoreError>;

    /// Persist a credential string, replacing any previous value
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    async fn save(&self, credential: &str) -> Result<(), StoreError>;

    /// Remove the stored credential (idempotent)
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    async fn clear(&self) -> Result<(), StoreError>;
}
