//! Error types used throughout the client

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Classification;

/// Why a refresh episode ended without a usable credential.
///
/// Cloned into every waiter of the episode and into the `RefreshFailed`
/// lifecycle signal.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RefreshFailure {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("refresh token rejected with status {status}")]
    Rejected { status: u16 },

    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),

    #[error("session ended while the refresh was in flight")]
    SessionEnded,

    #[error("request rejected again after a successful refresh")]
    RejectedAfterRefresh,
}

/// What made an attempt retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransientCause {
    #[error("server responded with status {0}")]
    Status(u16),

    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Main error type for AuthWire
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum ClientError {
    #[error("Credential expired")]
    AuthExpired,

    #[error("Authentication invalid: {reason}")]
    AuthInvalid { reason: RefreshFailure },

    #[error("Transient failure: {0}")]
    Transient(TransientCause),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: TransientCause },

    #[error("Request failed with status {status}")]
    Permanent { status: u16, body: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Classification of the failure this error represents, if any.
    #[must_use]
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Self::AuthExpired | Self::AuthInvalid { .. } => Some(Classification::AuthFailure),
            Self::Transient(_) | Self::RetryExhausted { .. } => {
                Some(Classification::TransientFailure)
            }
            Self::Permanent { .. } => Some(Classification::PermanentFailure),
            Self::Cancelled => Some(Classification::Cancelled),
            _ => None,
        }
    }

    /// Terminal authentication failure: the host should treat the user as
    /// signed out.
    #[must_use]
    pub fn is_auth_terminal(&self) -> bool {
        matches!(self, Self::AuthInvalid { .. })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn auth_invalid(reason: RefreshFailure) -> Self {
        Self::AuthInvalid { reason }
    }
}

/// Result type alias for AuthWire operations
pub type Result<T> = std::result::Result<T, ClientError>;
