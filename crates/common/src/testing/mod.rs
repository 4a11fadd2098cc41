//! Testing utilities and helpers
//!
//! - **[`time`]**: a hand-driven clock for deterministic expiry and session
//!   tests

pub mod time;

pub use time::MockClock;
