//! Shared helpers for infra integration tests.

#![allow(dead_code)]

use std::time::Duration;

use authwire_domain::{ClientConfig, Credential};
use chrono::Utc;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Config pointed at `server` with millisecond backoff.
pub fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig {
        base_url: server.uri(),
        refresh_url: format!("{}{REFRESH_PATH}", server.uri()),
        request_timeout_ms: 2_000,
        ..ClientConfig::default()
    };
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config
}

/// Credential issued now and valid for an hour.
pub fn fresh_credential(access: &str) -> Credential {
    Credential::bearer(access, format!("{access}-refresh"), Utc::now(), Duration::from_secs(3_600))
        .expect("valid credential")
}

/// Refresh endpoint body granting `access` for an hour.
pub fn grant_body(access: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": format!("{access}-refresh"),
        "token_type": "Bearer",
        "expires_at": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
    })
}

/// Number of requests the server saw carrying `Bearer <token>`.
pub async fn requests_with_token(server: &MockServer, token: &str) -> usize {
    let expected = format!("Bearer {token}");
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| {
            r.headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str())
        })
        .count()
}
