//! Resilience patterns for transient failures
//!
//! - **Retry policy**: bounded exponential backoff with proportional jitter.
//!   The policy only decides; callers own the sleeping so that cancellation
//!   can interrupt it.

pub mod retry;

pub use retry::{should_retry, should_retry_with, RetryDecision, RetryError, RetryPolicy, RetryState};
