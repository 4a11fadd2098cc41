//! Single-attempt dispatch.
//!
//! Resolves the URL, attaches the current credential, races the transport
//! call against its timeout and the caller's cancellation token, and
//! classifies whatever comes back. Retrying and refreshing are decided by
//! the caller.

use std::sync::Arc;
use std::time::Duration;

use authwire_common::Clock;
use authwire_domain::constants::AUTHORIZATION_HEADER;
use authwire_domain::{ApiRequest, ApiResponse, Classification, ClientError, TransientCause};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::classify::classify_response;
use super::ports::{Transport, TransportError};
use crate::auth::token_store::TokenStore;

/// Classified result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx/3xx response
    Success(ApiResponse),
    /// 401, or 403 carrying an invalid-token marker
    AuthFailure(ApiResponse),
    /// Worth retrying after a backoff
    Transient(TransientCause),
    /// Resolves the call as-is
    Permanent(ClientError),
    /// The caller's token fired first
    Cancelled,
}

impl Outcome {
    /// Coarse class used by the retry policy and logs.
    pub fn classification(&self) -> Classification {
        match self {
            Self::Success(_) => Classification::Success,
            Self::AuthFailure(_) => Classification::AuthFailure,
            Self::Transient(_) => Classification::TransientFailure,
            Self::Permanent(_) => Classification::PermanentFailure,
            Self::Cancelled => Classification::Cancelled,
        }
    }
}

/// One attempt and the credential generation it was sent with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Credential generation attached to the request (the store's current
    /// generation when sent unauthenticated)
    pub generation: u64,
    pub outcome: Outcome,
}

/// Sends one attempt through the [`Transport`] port with the current
/// credential and a hard timeout.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<TokenStore>,
    base_url: String,
    timeout: Duration,
}

impl Dispatcher {
    /// Relative request paths are joined onto `base_url`; absolute URLs are
    /// sent unchanged.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<TokenStore>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self { transport, store, base_url: base_url.into(), timeout }
    }

    /// Send `request` once with whatever credential is current.
    pub async fn dispatch(&self, request: &ApiRequest, cancel: &CancellationToken) -> Attempt {
        let snapshot = self.store.snapshot();
        let generation = snapshot.generation;
        if cancel.is_cancelled() {
            return Attempt { generation, outcome: Outcome::Cancelled };
        }

        let mut prepared = request.clone();
        prepared.path = self.resolve(&request.path);
        prepared.headers.retain(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
        let now = self.store.clock().now();
        if let Some(credential) =
            snapshot.credential.as_ref().filter(|c| !c.is_expired_at(now, Duration::ZERO))
        {
            prepared.headers.push((AUTHORIZATION_HEADER.to_string(), credential.authorization_value()));
        }

        debug!(method = prepared.method.as_str(), url = %prepared.path, generation, "dispatching");
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Outcome::Cancelled,
            result = tokio::time::timeout(self.timeout, self.transport.execute(prepared)) => {
                match result {
                    Ok(Ok(response)) => self.classify(response),
                    Ok(Err(error)) => self.classify_error(error),
                    Err(_) => Outcome::Transient(TransientCause::Timeout {
                        after_ms: self.timeout.as_millis() as u64,
                    }),
                }
            }
        };
        debug!(generation, classification = %outcome.classification(), "attempt finished");
        Attempt { generation, outcome }
    }

    fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn classify(&self, response: ApiResponse) -> Outcome {
        match classify_response(&response) {
            Classification::Success => Outcome::Success(response),
            Classification::AuthFailure => Outcome::AuthFailure(response),
            Classification::TransientFailure => Outcome::Transient(TransientCause::Status(response.status)),
            _ => Outcome::Permanent(ClientError::Permanent {
                status: response.status,
                body: response.text(),
            }),
        }
    }

    fn classify_error(&self, error: TransportError) -> Outcome {
        let cause = match error {
            TransportError::Timeout => {
                TransientCause::Timeout { after_ms: self.timeout.as_millis() as u64 }
            }
            TransportError::Connection(reason) => TransientCause::Connection(reason),
            TransportError::InvalidRequest(reason) => {
                return Outcome::Permanent(ClientError::InvalidRequest(reason));
            }
        };
        Outcome::Transient(cause)
    }
}
