//! Resilience primitives
//!
//! - **[`backoff`]**: Bounded linear-multiplier backoff used by the HTTP
//!   transport between transient-failure retries

pub mod backoff;

pub use backoff::Backoff;
