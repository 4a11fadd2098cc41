//! Credential types: the access/refresh pair and the refresh endpoint's
//! response shape.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TOKEN_TYPE;
use crate::errors::{ClientError, RefreshFailure};

/// Access/refresh token pair with its issue and expiry timestamps.
///
/// A credential is always replaced as a whole. An empty `access_token` means
/// "unauthenticated".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential and check its invariants.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidCredential` when `expires_at` is not after
    /// `issued_at`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, ClientError> {
        let credential = Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: token_type.into(),
            issued_at,
            expires_at,
        };
        credential.validate()?;
        Ok(credential)
    }

    /// Bearer credential issued at `issued_at` and valid for `lifetime`.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidCredential` for a zero lifetime.
    pub fn bearer(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self, ClientError> {
        Self::new(
            access_token,
            refresh_token,
            DEFAULT_TOKEN_TYPE,
            issued_at,
            issued_at + to_chrono(lifetime),
        )
    }

    /// Check `expires_at > issued_at`.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidCredential` when the invariant is broken.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.expires_at <= self.issued_at {
            return Err(ClientError::InvalidCredential(format!(
                "expires_at ({}) must be after issued_at ({})",
                self.expires_at, self.issued_at
            )));
        }
        Ok(())
    }

    /// An empty access token is equivalent to no credential at all.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// True when `now + skew` has reached the expiry deadline.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now + to_chrono(skew) >= self.expires_at
    }

    /// Time left until `expires_at`, saturating at zero.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Value for the `Authorization` header: `<token_type> <access_token>`.
    #[must_use]
    pub fn authorization_value(&self) -> String {
        let token_type =
            if self.token_type.is_empty() { DEFAULT_TOKEN_TYPE } else { self.token_type.as_str() };
        format!("{} {}", token_type, self.access_token)
    }
}

// Tokens never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Convert a std duration for timestamp arithmetic, saturating at a century.
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Response body of the refresh endpoint.
///
/// Every field is required: anything else is a malformed response and a
/// refresh failure. camelCase names are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshGrant {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(alias = "tokenType")]
    pub token_type: String,
    #[serde(alias = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

impl RefreshGrant {
    /// Turn the grant into a full replacement credential issued at `now`.
    ///
    /// # Errors
    /// Returns `RefreshFailure::MalformedResponse` for empty tokens or an
    /// expiry that is not in the future.
    pub fn into_credential(self, now: DateTime<Utc>) -> Result<Credential, RefreshFailure> {
        if self.access_token.is_empty() {
            return Err(RefreshFailure::MalformedResponse("empty access_token".into()));
        }
        if self.refresh_token.is_empty() {
            return Err(RefreshFailure::MalformedResponse("empty refresh_token".into()));
        }
        Credential::new(self.access_token, self.refresh_token, self.token_type, now, self.expires_at)
            .map_err(|e| RefreshFailure::MalformedResponse(e.to_string()))
    }
}
