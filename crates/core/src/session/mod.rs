//! Session liveness tracking.

pub mod monitor;
