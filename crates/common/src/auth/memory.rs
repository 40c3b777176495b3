//! In-process credential store

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::{CredentialStore, StoreError};

/// Credential store that lives only as long as the process
///
/// Used for ephemeral sessions and as the default store in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a raw credential, valid or not.
    pub fn with_credential(raw: impl Into<String>) -> Self {
        Self { slot: RwLock::new(Some(raw.into())) }
    }

    /// Snapshot of the stored value without going through the async trait
    #[must_use]
    pub fn snapshot(&self) -> Option<String> {
        self.slot.read().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot.read().clone())
    }

    async fn save(&self, credential: &str) -> Result<(), StoreError> {
        *self.slot.write() = Some(credential.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.slot.write() = None;
        Ok(())
    }
}
