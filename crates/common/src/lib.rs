//! Modular common utilities shared across AuthWire crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: side-effect-free time sources (`Clock`, `SystemClock`)
//! - `runtime` (default): the traced retry policy
//! - `test-utils`: deterministic clocks for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{should_retry, should_retry_with, RetryDecision, RetryError, RetryPolicy, RetryState};
#[cfg(feature = "foundation")]
pub use time::{Clock, SharedClock, SystemClock};
