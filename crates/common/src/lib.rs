//! Common utilities shared across Tablemate crates.
//!
//! - `auth`: credential stores and the cookie mirror
//! - `resilience`: retry backoff
//! - `testing`: mocks for the above (`test-utils` feature)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use auth::{
    CookieMirror, CredentialStore, FileCredentialStore, KeychainCredentialStore,
    MemoryCredentialStore, NoopCookieMirror, SameSite, SessionCookie, StoreError,
};
pub use resilience::Backoff;
