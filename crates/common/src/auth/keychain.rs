//! Keychain-backed credential store
//!
//! Stores the credential in the platform keychain (macOS Keychain, Windows
//! Credential Manager) through the `keyring` crate. The entry is created once
//! and reused, so every operation addresses the same service/account pair.
//! `keyring` calls block on the platform API and run on tokio's blocking pool.
//!
//! On targets without a native backend `keyring` falls back to an in-memory
//! mock; [`KeychainCredentialStore::PLATFORM_BACKED`] is `false` there.

use std::sync::Arc;

use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use super::store::{CredentialStore, StoreError};

/// Credential store backed by the platform keychain
pub struct KeychainCredentialStore {
    entry: Arc<Entry>,
    service: String,
    account: String,
}

impl KeychainCredentialStore {
    /// Whether this target has a durable keychain backend enabled
    pub const PLATFORM_BACKED: bool =
        cfg!(any(target_os = "macos", target_os = "ios", target_os = "windows"));

    /// Create a keychain store for a service/account pair
    ///
    /// # Arguments
    /// * `service` - Keychain service name (e.g., "Tablemate.api")
    /// * `account` - Keychain account name (e.g., "session")
    ///
    /// # Errors
    /// Returns `StoreError::Keychain` if the entry cannot be created
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Result<Self, StoreError> {
        let service = service.into();
        let account = account.into();
        let entry = Entry::new(&service, &account).map_err(|e| {
            StoreError::Keychain(format!("Failed to create entry for {}/{}: {}", service, account, e))
        })?;

        Ok(Self { entry: Arc::new(entry), service, account })
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    async fn blocking<T, F>(&self, op: F) -> Result<keyring::Result<T>, StoreError>
    where
        F: FnOnce(&Entry) -> keyring::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let entry = Arc::clone(&self.entry);
        tokio::task::spawn_blocking(move || op(&entry))
            .await
            .map_err(|e| StoreError::Keychain(format!("Keychain task failed: {}", e)))
    }
}

impl std::fmt::Debug for KeychainCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainCredentialStore")
            .field("service", &self.service)
            .field("account", &self.account)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        match self.blocking(|entry| entry.get_password()).await? {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keychain(format!(
                "Failed to read credential for {}: {}",
                self.account, e
            ))),
        }
    }

    async fn save(&self, credential: &str) -> Result<(), StoreError> {
        debug!(service = %self.service, account = %self.account, "Storing credential in keychain");

        let credential = credential.to_string();
        self.blocking(move |entry| entry.set_password(&credential)).await?.map_err(|e| {
            StoreError::Keychain(format!("Failed to store credential for {}: {}", self.account, e))
        })
    }

    async fn clear(&self) -> Result<(), StoreError> {
        debug!(service = %self.service, account = %self.account, "Deleting credential from keychain");

        match self.blocking(|entry| entry.delete_credential()).await? {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keychain(format!(
                "Failed to delete credential for {}: {}",
                self.account, e
            ))),
        }
    }
}
