//! # AuthWire Core
//!
//! Credential-carrying request logic - no concrete HTTP or storage code.
//!
//! This crate contains:
//! - The token store and its storage port
//! - The request pipeline (credential injection, response classification)
//! - The single-flight refresh coordinator
//! - The session monitor and lifecycle signals
//! - Per-operation cancellation and the `AuthClient` facade
//!
//! ## Architecture Principles
//! - Only depends on `authwire-domain` and `authwire-common`
//! - Network and disk access go through the ports in [`auth::ports`] and
//!   [`http::ports`]
//! - Time is injected through `authwire_common::Clock`

pub mod auth;
pub mod cancellation;
pub mod client;
pub mod http;
pub mod metrics;
pub mod session;
pub mod signals;

// Re-export specific items to avoid ambiguity
pub use auth::ports::{CredentialStorage, RefreshClient, StorageError};
pub use auth::refresh::{EpisodeState, RefreshCoordinator};
pub use auth::storage::MemoryCredentialStorage;
pub use auth::token_store::{TokenSnapshot, TokenStore};
pub use cancellation::{CancellationRegistry, OperationHandle};
pub use client::{AuthClient, AuthClientBuilder};
pub use http::dispatcher::{Attempt, Dispatcher, Outcome};
pub use http::ports::{Transport, TransportError};
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use session::monitor::SessionMonitor;
pub use signals::LifecycleSignals;
