//! Retry decisions for transient request failures.
//!
//! The policy is a pure decision engine: given the per-call [`RetryState`]
//! and the classification of the last attempt it answers "retry after this
//! long" or "stop". It never sleeps and never performs I/O, which keeps it
//! usable from a cancellable loop and testable with a seeded RNG.
//!
//! Delays follow `min(max_delay, base_delay * 2^attempt)`, perturbed by a
//! uniform `± delay * jitter_factor` and clamped to `[0, max_delay]`.

use std::time::Duration;

use authwire_domain::{Classification, RetrySettings};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while building a retry policy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError {
    /// The retry configuration is invalid
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Decision for whether to resubmit an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resubmit after the given delay
    RetryAfter(Duration),
    /// Don't retry the operation
    NoRetry,
}

/// Backoff parameters shared by every call of a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts allowed after the first one
    pub ceiling: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction in `[0, 1)`
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_validated(&RetrySettings::default())
    }
}

impl RetryPolicy {
    /// Create a policy with validation
    ///
    /// # Errors
    /// Returns `RetryError::InvalidConfiguration` when `jitter_factor` is
    /// outside `[0, 1)` or `base_delay > max_delay`.
    pub fn new(
        ceiling: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_factor: f64,
    ) -> Result<Self, RetryError> {
        let policy = Self { ceiling, base_delay, max_delay, jitter_factor };
        policy.validate()?;
        Ok(policy)
    }

    /// Build from the configuration section.
    ///
    /// # Errors
    /// See [`RetryPolicy::new`].
    pub fn from_settings(settings: &RetrySettings) -> Result<Self, RetryError> {
        Self::new(
            settings.max_retries,
            settings.base_delay(),
            settings.max_delay(),
            settings.jitter_factor,
        )
    }

    fn from_validated(settings: &RetrySettings) -> Self {
        Self {
            ceiling: settings.max_retries,
            base_delay: settings.base_delay(),
            max_delay: settings.max_delay(),
            jitter_factor: settings.jitter_factor,
        }
    }

    /// Policy that never retries
    pub fn disabled() -> Self {
        Self { ceiling: 0, ..Self::default() }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryError> {
        if !(0.0..1.0).contains(&self.jitter_factor) {
            return Err(RetryError::InvalidConfiguration {
                message: format!("jitter_factor must be in [0, 1), got {}", self.jitter_factor),
            });
        }
        if self.base_delay > self.max_delay {
            return Err(RetryError::InvalidConfiguration {
                message: format!(
                    "base_delay {:?} exceeds max_delay {:?}",
                    self.base_delay, self.max_delay
                ),
            });
        }
        Ok(())
    }

    /// Fresh per-call state
    pub fn start(&self) -> RetryState {
        RetryState { attempt: 0, policy: *self }
    }

    /// Un-jittered delay for `attempt` (0-based), capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let factor = 2f64.powi(attempt.min(63) as i32);
        Duration::from_millis((base_ms * factor).min(max_ms) as u64)
    }

    /// Inclusive bounds any jittered delay for `attempt` falls within.
    pub fn delay_envelope(&self, attempt: u32) -> (Duration, Duration) {
        let delay = self.backoff_delay(attempt).as_millis() as f64;
        let spread = delay * self.jitter_factor;
        let max_ms = self.max_delay.as_millis() as f64;
        let low = (delay - spread).clamp(0.0, max_ms);
        let high = (delay + spread).clamp(0.0, max_ms);
        (Duration::from_millis(low.floor() as u64), Duration::from_millis(high.ceil() as u64))
    }

    fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.backoff_delay(attempt).as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let offset = if self.jitter_factor > 0.0 {
            rng.gen_range(-1.0_f64..=1.0) * delay * self.jitter_factor
        } else {
            0.0
        };
        Duration::from_millis((delay + offset).clamp(0.0, max_ms).round() as u64)
    }
}

/// Per-call retry bookkeeping. Never shared between calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryState {
    /// Retries already scheduled for this call
    pub attempt: u32,
    pub policy: RetryPolicy,
}

impl RetryState {
    /// Record that a scheduled retry is being performed
    pub fn advance(&mut self) {
        if self.attempt < self.policy.ceiling {
            self.attempt += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.policy.ceiling
    }

    /// Total attempts made so far, including the first one
    pub fn attempts_made(&self) -> u32 {
        self.attempt + 1
    }
}

/// Decide whether to retry using the thread-local RNG for jitter.
pub fn should_retry(state: &RetryState, classification: Classification) -> RetryDecision {
    should_retry_with(state, classification, &mut rand::thread_rng())
}

/// Decide whether to retry with an injected random source.
///
/// Only `TransientFailure` is retryable, and only while `state.attempt` is
/// below the ceiling.
pub fn should_retry_with<R: Rng + ?Sized>(
    state: &RetryState,
    classification: Classification,
    rng: &mut R,
) -> RetryDecision {
    if classification != Classification::TransientFailure {
        return RetryDecision::NoRetry;
    }
    if state.is_exhausted() {
        debug!(attempt = state.attempt, ceiling = state.policy.ceiling, "retry ceiling reached");
        return RetryDecision::NoRetry;
    }
    RetryDecision::RetryAfter(state.policy.jittered_delay(state.attempt, rng))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1000), Duration::from_millis(8000), jitter).unwrap()
    }

    /// Validates the exponential backoff curve without jitter.
    ///
    /// Assertions:
    /// - Delays double from the base delay.
    /// - Delays saturate at `max_delay`.
    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy(0.0);

        assert_eq!(policy.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(8000));
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_millis(8000));
    }

    /// Validates that jittered delays stay inside the envelope.
    ///
    /// Assertions:
    /// - Every sampled delay lies within `delay_envelope(attempt)`.
    /// - No sampled delay exceeds `max_delay`.
    #[test]
    fn test_jitter_stays_within_envelope() {
        let policy = policy(0.2);
        let mut rng = StdRng::seed_from_u64(7);

        for attempt in 0..3 {
            let mut state = policy.start();
            state.attempt = attempt;
            let (low, high) = policy.delay_envelope(attempt);
            for _ in 0..200 {
                match should_retry_with(&state, Classification::TransientFailure, &mut rng) {
                    RetryDecision::RetryAfter(delay) => {
                        assert!(delay >= low && delay <= high, "{delay:?} outside {low:?}..{high:?}");
                        assert!(delay <= policy.max_delay);
                    }
                    RetryDecision::NoRetry => panic!("attempt {attempt} should retry"),
                }
            }
        }
    }

    #[test]
    fn test_envelope_for_default_curve() {
        let policy = policy(0.2);
        assert_eq!(
            policy.delay_envelope(0),
            (Duration::from_millis(800), Duration::from_millis(1200))
        );
        assert_eq!(
            policy.delay_envelope(2),
            (Duration::from_millis(3200), Duration::from_millis(4800))
        );
        // Clamped at max_delay from above.
        assert_eq!(
            policy.delay_envelope(3),
            (Duration::from_millis(6400), Duration::from_millis(8000))
        );
    }

    /// Validates the ceiling.
    ///
    /// Assertions:
    /// - Exactly `ceiling` retries are granted.
    /// - `advance` never pushes `attempt` past the ceiling.
    #[test]
    fn test_ceiling_is_respected() {
        let policy = policy(0.0);
        let mut state = policy.start();
        let mut granted = 0;

        while let RetryDecision::RetryAfter(_) = should_retry(&state, Classification::TransientFailure) {
            granted += 1;
            state.advance();
        }

        assert_eq!(granted, 3);
        assert_eq!(state.attempt, 3);
        assert_eq!(state.attempts_made(), 4);
        state.advance();
        assert_eq!(state.attempt, 3);
    }

    #[test]
    fn test_only_transient_failures_retry() {
        let state = policy(0.2).start();
        for classification in [
            Classification::Success,
            Classification::AuthFailure,
            Classification::PermanentFailure,
            Classification::Cancelled,
        ] {
            assert_eq!(should_retry(&state, classification), RetryDecision::NoRetry);
        }
    }

    #[test]
    fn test_disabled_policy_never_retries() {
        let state = RetryPolicy::disabled().start();
        assert_eq!(should_retry(&state, Classification::TransientFailure), RetryDecision::NoRetry);
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        assert!(RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(8), 1.0).is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(8), -0.1).is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(9), Duration::from_secs(8), 0.2).is_err());
    }

    #[test]
    fn test_from_settings_uses_defaults() {
        let policy = RetryPolicy::from_settings(&RetrySettings::default()).unwrap();
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(policy.ceiling, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }
}
