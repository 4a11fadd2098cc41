//! Refresh endpoint adapter.

pub mod refresh_client;

pub use refresh_client::HttpRefreshClient;
