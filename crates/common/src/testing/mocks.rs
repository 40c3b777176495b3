//! Mock implementations for credential persistence

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{CookieMirror, CredentialStore, MemoryCredentialStore, SessionCookie, StoreError};

/// Cookie mirror that records every write for later inspection.
#[derive(Debug, Default)]
pub struct RecordingCookieMirror {
    writes: Mutex<Vec<SessionCookie>>,
    fail: AtomicBool,
}

impl RecordingCookieMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (they are still recorded).
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All cookies written so far, oldest first.
    pub fn writes(&self) -> Vec<SessionCookie> {
        self.writes.lock().clone()
    }

    pub fn last(&self) -> Option<SessionCookie> {
        self.writes.lock().last().cloned()
    }
}

impl CookieMirror for RecordingCookieMirror {
    fn write(&self, cookie: &SessionCookie) -> Result<(), StoreError> {
        self.writes.lock().push(cookie.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Mirror("mirror unavailable".to_string()));
        }
        Ok(())
    }
}

/// Credential store wrapper that can refuse writes and counts operations.
#[derive(Debug, Default)]
pub struct FlakyCredentialStore {
    inner: MemoryCredentialStore,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl FlakyCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(raw: impl Into<String>) -> Self {
        Self { inner: MemoryCredentialStore::with_credential(raw), ..Self::default() }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<String> {
        self.inner.snapshot()
    }
}

#[async_trait]
impl CredentialStore for FlakyCredentialStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load().await
    }

    async fn save(&self, credential: &str) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk is read-only".to_string()));
        }
        self.inner.save(credential).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}
