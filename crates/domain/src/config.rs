//! Client configuration structures and defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_REFRESH_SKEW_SECS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_JITTER, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_SESSION_CHECK_SECS, DEFAULT_SESSION_IDLE_SECS, DEFAULT_SESSION_WARNING_SECS,
};
use crate::errors::{ClientError, Result};

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL that relative request paths are joined onto
    pub base_url: String,
    /// Absolute URL of the refresh endpoint
    pub refresh_url: String,
    /// Hard timeout applied to every network call
    pub request_timeout_ms: u64,
    /// Treat the access token as expired this long before its deadline
    pub refresh_skew_secs: u64,
    pub retry: RetrySettings,
    pub session: SessionSettings,
    pub storage: StorageSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            refresh_url: "http://localhost:8080/auth/refresh".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            retry: RetrySettings::default(),
            session: SessionSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.refresh_skew_secs)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `ClientError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if self.refresh_url.trim().is_empty() {
            return Err(ClientError::Config("refresh_url must not be empty".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config("request_timeout_ms must be positive".into()));
        }
        self.retry.validate()?;
        self.session.validate()
    }
}

/// Backoff parameters for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Additional attempts after the first one
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the delay used as a uniform ± perturbation, in `[0, 1)`
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            jitter_factor: DEFAULT_RETRY_JITTER,
        }
    }
}

impl RetrySettings {
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// # Errors
    /// Returns `ClientError::Config` for an out-of-range jitter or inverted
    /// delay bounds.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.jitter_factor) {
            return Err(ClientError::Config(format!(
                "retry.jitter_factor must be in [0, 1), got {}",
                self.jitter_factor
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ClientError::Config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Session liveness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub warning_window_secs: u64,
    pub check_interval_secs: u64,
    /// `None` disables the idle ceiling
    pub idle_timeout_secs: Option<u64>,
    /// Absolute lifetime ceiling anchored at login; `None` means the
    /// credential expiry alone decides
    pub max_session_lifetime_secs: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            warning_window_secs: DEFAULT_SESSION_WARNING_SECS,
            check_interval_secs: DEFAULT_SESSION_CHECK_SECS,
            idle_timeout_secs: Some(DEFAULT_SESSION_IDLE_SECS),
            max_session_lifetime_secs: None,
        }
    }
}

impl SessionSettings {
    #[must_use]
    pub fn warning_window(&self) -> Duration {
        Duration::from_secs(self.warning_window_secs)
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_session_lifetime_secs.map(Duration::from_secs)
    }

    /// # Errors
    /// Returns `ClientError::Config` for a zero check interval or zero
    /// ceilings.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_secs == 0 {
            return Err(ClientError::Config("session.check_interval_secs must be positive".into()));
        }
        if self.idle_timeout_secs == Some(0) {
            return Err(ClientError::Config("session.idle_timeout_secs must be positive".into()));
        }
        if self.max_session_lifetime_secs == Some(0) {
            return Err(ClientError::Config(
                "session.max_session_lifetime_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Where and whether credentials are persisted across restarts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Credential file for the durable backend
    pub path: Option<PathBuf>,
    /// Default `persist` flag used by hosts that do not choose per login
    pub persist: bool,
}
