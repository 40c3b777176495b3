//! # Tablemate Infrastructure
//!
//! Impure layer of the Tablemate dashboard client.
//!
//! This crate contains:
//! - The HTTP transport with per-attempt timeout and transport retry
//! - The authenticated API client, session and single-flight refresh
//! - Login / 2FA / logout / password-reset flows
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Builds on `tablemate-domain` types and `tablemate-common` stores
//! - Contains all network I/O

pub mod api;
pub mod config;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{
    ApiClient, ApiClientBuilder, ApiError, ApiErrorCategory, AuthService, Invocation,
    LoginOutcome, Session, SessionBuilder, UploadFile,
};
pub use http::{HttpClient, HttpResponse, JarCookieMirror, TransportError};
pub use observability::{init_tracing, LogFormat};
