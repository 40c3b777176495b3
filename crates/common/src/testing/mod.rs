//! Testing utilities and helpers
//!
//! - **[`mocks`]**: Mock implementations of the persistence traits
//!
//! Enabled for this crate's own tests and, for downstream crates, through the
//! `test-utils` feature.

pub mod mocks;

pub use mocks::{FlakyCredentialStore, RecordingCookieMirror};
