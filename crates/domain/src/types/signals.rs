//! Lifecycle signals broadcast to the host application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{SIGNAL_REFRESH_FAILED, SIGNAL_SESSION_EXPIRED, SIGNAL_SESSION_WARNING};
use crate::errors::RefreshFailure;
use crate::types::session::ExpiryReason;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// The session enters its warning window. Fired once per session clock.
    SessionWarning { expires_at: DateTime<Utc>, remaining_secs: u64 },
    /// The monitor cleared the credential.
    SessionExpired { reason: ExpiryReason },
    /// A refresh episode failed and the credential was cleared.
    RefreshFailed { reason: RefreshFailure },
}

impl LifecycleSignal {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionWarning { .. } => SIGNAL_SESSION_WARNING,
            Self::SessionExpired { .. } => SIGNAL_SESSION_EXPIRED,
            Self::RefreshFailed { .. } => SIGNAL_REFRESH_FAILED,
        }
    }

    /// Signals after which the host should show its signed-out state.
    #[must_use]
    pub fn is_sign_out(&self) -> bool {
        !matches!(self, Self::SessionWarning { .. })
    }
}
