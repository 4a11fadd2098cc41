//! Port interfaces for credential persistence and the refresh endpoint
//!
//! These traits define the boundaries between the core refresh logic and
//! the infrastructure implementations in `authwire-infra`.

use async_trait::async_trait;
use authwire_domain::{Credential, RefreshFailure, RefreshGrant};
use thiserror::Error;

/// Error type for credential storage backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Backend cannot be reached or written
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Stored record exists but cannot be decoded
    #[error("corrupt credential record: {0}")]
    Corrupt(String),
}

/// Synchronous key/value backend holding at most one credential.
///
/// Implementations must replace the stored credential as a whole.
pub trait CredentialStorage: Send + Sync {
    /// Load the stored credential, `None` when nothing is stored
    fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Overwrite the stored credential
    fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Remove every stored key
    fn clear(&self) -> Result<(), StorageError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Trait for the refresh endpoint
///
/// Exactly one call is made per refresh episode; implementations must not
/// retry on their own.
#[async_trait]
pub trait RefreshClient: Send + Sync {
    /// Exchange a refresh token for a full replacement credential
    ///
    /// # Errors
    /// `RefreshFailure::Rejected` when the endpoint refuses the token,
    /// `Network` for transport problems and `MalformedResponse` when the
    /// body is not a complete credential.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, RefreshFailure>;
}
