//! # AuthWire Infrastructure
//!
//! Infrastructure implementations of the `authwire-core` ports.
//!
//! This crate contains:
//! - The reqwest-backed [`Transport`](authwire_core::Transport)
//! - The HTTP refresh endpoint client
//! - File-backed durable credential storage
//! - Configuration loading from environment and files
//! - Tracing subscriber setup and the [`bootstrap`] wiring helper
//!
//! ## Architecture
//! - Implements traits defined in `authwire-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use auth::HttpRefreshClient;
pub use bootstrap::{build_client, build_client_from_env};
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::{init_tracing, LogFormat};
pub use storage::FileCredentialStorage;
