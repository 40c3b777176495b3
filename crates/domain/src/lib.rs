//! # Tablemate Domain
//!
//! Client domain types for the Tablemate dashboard API.
//!
//! This crate contains:
//! - The bearer [`Credential`] and its structural validation
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Client constants
//!
//! ## Architecture
//! - No dependencies on other Tablemate crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod credential;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use credential::{Credential, CredentialError};
pub use errors::*;
