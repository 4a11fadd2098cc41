//! Application constants
//!
//! Centralized location for the defaults and wire names used throughout the
//! workspace.

// Durable storage keys (the only keys the token store ever writes)
pub const STORAGE_KEY_ACCESS_TOKEN: &str = "authwire.access_token";
pub const STORAGE_KEY_REFRESH_TOKEN: &str = "authwire.refresh_token";
pub const STORAGE_KEY_TOKEN_TYPE: &str = "authwire.token_type";
pub const STORAGE_KEY_ISSUED_AT: &str = "authwire.issued_at";
pub const STORAGE_KEY_EXPIRES_AT: &str = "authwire.expires_at";

/// All storage keys owned by the token store, in write order.
pub const STORAGE_KEYS: [&str; 5] = [
    STORAGE_KEY_ACCESS_TOKEN,
    STORAGE_KEY_REFRESH_TOKEN,
    STORAGE_KEY_TOKEN_TYPE,
    STORAGE_KEY_ISSUED_AT,
    STORAGE_KEY_EXPIRES_AT,
];

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
pub const AUTHORIZATION_HEADER: &str = "Authorization";

// Request pipeline
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_SKEW_SECS: u64 = 60;

// Retry policy
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8_000;
pub const DEFAULT_RETRY_JITTER: f64 = 0.2;

// Session monitor
pub const DEFAULT_SESSION_WARNING_SECS: u64 = 300;
pub const DEFAULT_SESSION_CHECK_SECS: u64 = 30;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 1_800;

// Lifecycle signal names exposed to host applications
pub const SIGNAL_SESSION_WARNING: &str = "session-warning";
pub const SIGNAL_SESSION_EXPIRED: &str = "session-expired";
pub const SIGNAL_REFRESH_FAILED: &str = "refresh-failed";
pub const SIGNAL_CHANNEL_CAPACITY: usize = 16;
