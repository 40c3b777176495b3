//! Credential persistence
//!
//! Storage backends for the session credential and the cookie mirror that
//! exposes it to server-side middleware.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Session     │  (tablemate-infra)
//! └────────┬────────┘
//!          │
//!          ├──► CredentialStore   (durable source of truth)
//!          │       ├── MemoryCredentialStore
//!          │       ├── FileCredentialStore
//!          │       └── KeychainCredentialStore
//!          │
//!          └──► CookieMirror      (best-effort copy)
//! ```
//!
//! # Module Organization
//!
//! - **[`store`]**: The `CredentialStore` trait and `StoreError`
//! - **[`memory`]**: In-process store
//! - **[`file_store`]**: JSON file store with atomic replace
//! - **[`keychain`]**: Platform keychain store via `keyring`
//! - **[`cookie`]**: `SessionCookie` attributes and the `CookieMirror` trait

pub mod cookie;
pub mod file_store;
pub mod keychain;
pub mod memory;
pub mod store;

pub use cookie::{CookieMirror, NoopCookieMirror, SameSite, SessionCookie};
pub use file_store::FileCredentialStore;
pub use keychain::KeychainCredentialStore;
pub use memory::MemoryCredentialStore;
pub use store::{CredentialStore, StoreError};
