//! Port interface for the HTTP transport

use async_trait::async_trait;
use authwire_domain::{ApiRequest, ApiResponse};
use thiserror::Error;

/// Failures below the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    /// Connection refused, reset, DNS failure and the like
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request could not be built (bad URL, bad header)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Trait for executing a single HTTP exchange
///
/// Implementations perform exactly one network call and never retry: the
/// pipeline owns retries, refresh and timeouts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` (its `path` is already an absolute URL)
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}
