//! API-specific error types
//!
//! Provides error classification for API operations with retry metadata.

use serde::Deserialize;
use tablemate_common::auth::StoreError;
use tablemate_domain::constants::GENERIC_ERROR_MESSAGE;
use tablemate_domain::{CredentialError, TablemateError};
use thiserror::Error;

use crate::http::TransportError;

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Network/DNS/timeout failures that exhausted the retry ceiling
    Transient,
    /// The session could not be recovered; re-authenticate
    Authentication,
    /// The server answered with a non-2xx status - never retried
    Rejected,
    /// Local request, decoding or storage problems - non-retryable
    Client,
    /// Configuration errors - non-retryable
    Config,
}

/// API operation errors
///
/// `Clone` so the outcome of a shared refresh can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    #[error("Server returned an invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credential storage failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Transport { .. } => ApiErrorCategory::Transient,
            Self::SessionExpired(_) => ApiErrorCategory::Authentication,
            Self::ServerRejected { .. } => ApiErrorCategory::Rejected,
            Self::Request(_) | Self::InvalidCredential(_) | Self::Decode(_) | Self::Storage(_) => {
                ApiErrorCategory::Client
            }
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Whether the caller may sensibly try the same call again later
    pub fn is_retryable(&self) -> bool {
        self.category() == ApiErrorCategory::Transient
    }

    /// HTTP status of a server rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    /// Build a rejection from a status and the raw response body.
    pub(crate) fn rejected(status: u16, body: &str) -> Self {
        Self::ServerRejected { status, message: server_message(body) }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Extract `error.message` from a `{ "error": { "message": ... } }` body,
/// falling back to a generic message.
pub fn server_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Exhausted { attempts, reason } => {
                Self::Transport { attempts, message: reason }
            }
            TransportError::Request(message) => Self::Request(message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        Self::InvalidCredential(err.to_string())
    }
}

/// Convert from TablemateError to ApiError
impl From<TablemateError> for ApiError {
    fn from(err: TablemateError) -> Self {
        match err {
            TablemateError::Config(msg) => Self::Config(msg),
            TablemateError::Storage(msg) => Self::Storage(msg),
            TablemateError::Auth(msg) => Self::SessionExpired(msg),
            TablemateError::Network(msg)
            | TablemateError::InvalidInput(msg)
            | TablemateError::Internal(msg) => Self::Request(msg),
        }
    }
}

impl From<ApiError> for TablemateError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport { .. } | ApiError::Request(_) => Self::Network(err.to_string()),
            ApiError::SessionExpired(_) | ApiError::InvalidCredential(_) => {
                Self::Auth(err.to_string())
            }
            ApiError::Storage(msg) => Self::Storage(msg),
            ApiError::Config(msg) => Self::Config(msg),
            ApiError::ServerRejected { .. } | ApiError::Decode(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}
