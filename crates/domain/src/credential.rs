//! Bearer credential with structural validation
//!
//! A credential is expected to be a three-segment signed token
//! (`header.payload.signature`). Only the shape is checked here; the
//! signature is never verified client-side. The expiry is decoded from the
//! payload's `exp` claim on a best-effort basis and is never required for a
//! credential to be usable.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Reasons a credential string is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential is empty")]
    Empty,

    #[error("credential must have 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    #[error("credential segment {index} is empty or not base64url")]
    MalformedSegment { index: usize },
}

/// A structurally valid bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<f64>,
}

impl Credential {
    /// Parse and validate a raw credential string.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    /// Returns [`CredentialError`] when the string does not have the
    /// `header.payload.signature` shape.
    pub fn parse(raw: impl Into<String>) -> Result<Self, CredentialError> {
        let raw: String = raw.into();
        let raw = raw.trim().to_string();

        validate_structure(&raw)?;
        let expires_at = decode_expiry(&raw);

        Ok(Self { raw, expires_at })
    }

    /// Check the three-segment shape without allocating a credential.
    #[must_use]
    pub fn is_well_formed(raw: &str) -> bool {
        validate_structure(raw.trim()).is_ok()
    }

    /// The raw token, suitable for an `Authorization: Bearer` header
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.raw
    }

    /// Expiry decoded from the payload, if it carried a numeric `exp` claim
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// `true` only when an expiry is known and lies at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Seconds until the decoded expiry, negative once expired
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}

impl FromStr for Credential {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Credential {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

// Never print the token itself.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("raw", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn validate_structure(raw: &str) -> Result<(), CredentialError> {
    if raw.is_empty() {
        return Err(CredentialError::Empty);
    }

    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != 3 {
        return Err(CredentialError::SegmentCount(segments.len()));
    }

    for (index, segment) in segments.iter().enumerate() {
        let valid = !segment.is_empty()
            && segment.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(CredentialError::MalformedSegment { index });
        }
    }

    Ok(())
}

fn decode_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let payload = raw.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.exp?;
    if !exp.is_finite() {
        return None;
    }
    Utc.timestamp_opt(exp as i64, 0).single()
}
