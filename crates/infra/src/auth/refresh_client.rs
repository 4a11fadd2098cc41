//! Refresh endpoint client.

use async_trait::async_trait;
use authwire_core::RefreshClient;
use authwire_domain::{RefreshFailure, RefreshGrant};
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use tracing::{debug, warn};

use crate::http::ReqwestTransport;

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// POSTs the refresh token to the configured URL and decodes the grant.
///
/// Any non-2xx status counts as a rejection. The response must carry a full
/// credential; partial bodies are `MalformedResponse`.
#[derive(Clone)]
pub struct HttpRefreshClient {
    client: ReqwestClient,
    url: String,
}

impl HttpRefreshClient {
    pub fn new(client: ReqwestClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    /// Share the transport's connection pool.
    pub fn from_transport(transport: &ReqwestTransport, url: impl Into<String>) -> Self {
        Self::new(transport.client().clone(), url)
    }
}

#[async_trait]
impl RefreshClient for HttpRefreshClient {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, RefreshFailure> {
        debug!(url = %self.url, "calling refresh endpoint");
        let response = self
            .client
            .post(&self.url)
            .json(&RefreshBody { refresh_token })
            .send()
            .await
            .map_err(|err| RefreshFailure::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "refresh endpoint rejected the token");
            return Err(RefreshFailure::Rejected { status: status.as_u16() });
        }

        let body = response.bytes().await.map_err(|err| RefreshFailure::Network(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| RefreshFailure::MalformedResponse(err.to_string()))
    }
}
