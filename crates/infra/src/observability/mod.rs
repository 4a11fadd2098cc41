//! Observability setup for hosts embedding the client.
//!
//! The client itself only emits `tracing` events and keeps counters in
//! `ClientMetrics`; installing a subscriber is left to the host.

pub mod logging;

pub use logging::{init_tracing, LogFormat};
