//! Configuration loader
//!
//! Loads [`ClientConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `AUTHWIRE_BASE_URL` or `AUTHWIRE_REFRESH_URL` is missing, falls back
//!    to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `AUTHWIRE_BASE_URL` (required): base URL for relative request paths
//! - `AUTHWIRE_REFRESH_URL` (required): refresh endpoint
//! - `AUTHWIRE_REQUEST_TIMEOUT_MS`: per-call timeout
//! - `AUTHWIRE_REFRESH_SKEW_SECS`: early-expiry skew
//! - `AUTHWIRE_MAX_RETRIES`, `AUTHWIRE_RETRY_BASE_MS`, `AUTHWIRE_RETRY_MAX_MS`,
//!   `AUTHWIRE_RETRY_JITTER`: backoff
//! - `AUTHWIRE_SESSION_WARNING_SECS`, `AUTHWIRE_SESSION_CHECK_SECS`: monitor
//! - `AUTHWIRE_SESSION_IDLE_SECS`, `AUTHWIRE_SESSION_MAX_LIFETIME_SECS`:
//!   ceilings, `off` disables
//! - `AUTHWIRE_STORAGE_PATH`: credential file
//! - `AUTHWIRE_PERSIST`: persist logins by default (true/false)
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes `authwire.{toml,json}` then `config.{toml,json}` in the
//! current directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use authwire_domain::{ClientConfig, ClientError, Result};

pub const ENV_BASE_URL: &str = "AUTHWIRE_BASE_URL";
pub const ENV_REFRESH_URL: &str = "AUTHWIRE_REFRESH_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "AUTHWIRE_REQUEST_TIMEOUT_MS";
pub const ENV_REFRESH_SKEW_SECS: &str = "AUTHWIRE_REFRESH_SKEW_SECS";
pub const ENV_MAX_RETRIES: &str = "AUTHWIRE_MAX_RETRIES";
pub const ENV_RETRY_BASE_MS: &str = "AUTHWIRE_RETRY_BASE_MS";
pub const ENV_RETRY_MAX_MS: &str = "AUTHWIRE_RETRY_MAX_MS";
pub const ENV_RETRY_JITTER: &str = "AUTHWIRE_RETRY_JITTER";
pub const ENV_SESSION_WARNING_SECS: &str = "AUTHWIRE_SESSION_WARNING_SECS";
pub const ENV_SESSION_CHECK_SECS: &str = "AUTHWIRE_SESSION_CHECK_SECS";
pub const ENV_SESSION_IDLE_SECS: &str = "AUTHWIRE_SESSION_IDLE_SECS";
pub const ENV_SESSION_MAX_LIFETIME_SECS: &str = "AUTHWIRE_SESSION_MAX_LIFETIME_SECS";
pub const ENV_STORAGE_PATH: &str = "AUTHWIRE_STORAGE_PATH";
pub const ENV_PERSIST: &str = "AUTHWIRE_PERSIST";

const CONFIG_FILE_NAMES: [&str; 4] = ["authwire.toml", "authwire.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ClientError::Config` if configuration cannot be loaded from
/// either source or fails validation.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `ClientError::Config` if a required variable is missing or a
/// value does not parse.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig {
        base_url: env_var(ENV_BASE_URL)?,
        refresh_url: env_var(ENV_REFRESH_URL)?,
        ..ClientConfig::default()
    };

    if let Some(ms) = env_parse(ENV_REQUEST_TIMEOUT_MS)? {
        config.request_timeout_ms = ms;
    }
    if let Some(secs) = env_parse(ENV_REFRESH_SKEW_SECS)? {
        config.refresh_skew_secs = secs;
    }

    if let Some(retries) = env_parse(ENV_MAX_RETRIES)? {
        config.retry.max_retries = retries;
    }
    if let Some(ms) = env_parse(ENV_RETRY_BASE_MS)? {
        config.retry.base_delay_ms = ms;
    }
    if let Some(ms) = env_parse(ENV_RETRY_MAX_MS)? {
        config.retry.max_delay_ms = ms;
    }
    if let Some(jitter) = env_parse(ENV_RETRY_JITTER)? {
        config.retry.jitter_factor = jitter;
    }

    if let Some(secs) = env_parse(ENV_SESSION_WARNING_SECS)? {
        config.session.warning_window_secs = secs;
    }
    if let Some(secs) = env_parse(ENV_SESSION_CHECK_SECS)? {
        config.session.check_interval_secs = secs;
    }
    if let Some(ceiling) = env_ceiling(ENV_SESSION_IDLE_SECS)? {
        config.session.idle_timeout_secs = ceiling;
    }
    if let Some(ceiling) = env_ceiling(ENV_SESSION_MAX_LIFETIME_SECS)? {
        config.session.max_session_lifetime_secs = ceiling;
    }

    config.storage.path = std::env::var(ENV_STORAGE_PATH).ok().filter(|p| !p.is_empty()).map(PathBuf::from);
    config.storage.persist = env_bool(ENV_PERSIST, false);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
///
/// # Errors
/// Returns `ClientError::Config` if the file is missing, unreadable, has an
/// invalid format, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ClientError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ClientError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ClientError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); missing fields
/// take their defaults.
///
/// # Errors
/// Returns `ClientError::Config` if the format is unsupported or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ClientError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ClientError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ClientError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| ClientError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable; unset means `None`
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("Invalid {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Optional ceiling in seconds: unset keeps the default, `off`/`none`
/// disables it.
fn env_ceiling(key: &str) -> Result<Option<Option<u64>>> {
    match std::env::var(key) {
        Ok(raw) if matches!(raw.trim().to_ascii_lowercase().as_str(), "off" | "none") => {
            Ok(Some(None))
        }
        Ok(_) => env_parse(key).map(|secs| secs.map(Some)),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
