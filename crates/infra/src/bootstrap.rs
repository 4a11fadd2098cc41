//! Wiring helper: turns a [`ClientConfig`] into a ready [`AuthClient`] with
//! the reqwest transport, the HTTP refresh client and, when a path is
//! configured, file-backed durable storage.

use std::sync::Arc;

use anyhow::Context;
use authwire_core::AuthClient;
use authwire_domain::ClientConfig;
use tracing::info;

use crate::auth::HttpRefreshClient;
use crate::config;
use crate::http::ReqwestTransport;
use crate::storage::FileCredentialStorage;

/// Build a client and restore any persisted session.
///
/// # Errors
/// Fails when the HTTP client cannot be built or the configuration is
/// invalid.
pub fn build_client(config: ClientConfig) -> anyhow::Result<AuthClient> {
    let transport = ReqwestTransport::builder()
        .timeout(config.request_timeout())
        .build()
        .context("building HTTP transport")?;
    let refresher = HttpRefreshClient::from_transport(&transport, config.refresh_url.clone());

    let mut builder = AuthClient::builder(config.clone())
        .transport(Arc::new(transport))
        .refresh_client(Arc::new(refresher));
    if let Some(path) = &config.storage.path {
        builder = builder.durable_storage(Arc::new(FileCredentialStorage::new(path)));
    }

    let client = builder.build().context("assembling auth client")?;
    if client.restore_session() {
        info!("restored persisted session");
    }
    Ok(client)
}

/// [`build_client`] with configuration from [`config::load`].
///
/// # Errors
/// Fails when no configuration can be loaded or the client cannot be built.
pub fn build_client_from_env() -> anyhow::Result<AuthClient> {
    let config = config::load().context("loading client configuration")?;
    build_client(config)
}
