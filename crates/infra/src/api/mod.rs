//! Authenticated API client for the Tablemate dashboard
//!
//! # Architecture
//!
//! - `ApiClient` builds each attempt through `HttpClient` (no direct reqwest)
//! - `Session` owns the credential store, cookie mirror and refresh slot
//! - Single-flight refresh on 401, one replay per invocation
//! - `AuthService` drives login, 2FA, logout and password reset
//!
//! Credentials are never logged; `tracing` spans skip bodies and secrets.

pub mod auth;
pub mod client;
pub mod errors;
pub mod invocation;
pub mod refresh;
pub mod session;

pub use auth::{AuthService, LoginOutcome};
pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{server_message, ApiError, ApiErrorCategory};
pub use invocation::{Invocation, RequestBody, UploadFile};
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, RefreshOutcome, RefreshState, TokenRefresher};
pub use session::{Session, SessionBuilder, SessionEndedHook};
