//! HTTP transport
//!
//! - **[`client`]**: `HttpClient` with per-attempt timeout and transport retry
//! - **[`cookies`]**: `JarCookieMirror`, the cookie jar shared with the client

pub mod client;
pub mod cookies;

pub use client::{HttpClient, HttpClientBuilder, HttpResponse, TransportError};
pub use cookies::JarCookieMirror;
