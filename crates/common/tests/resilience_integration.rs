//! Integration tests for the retry policy driving a real sleep loop.

#![cfg(feature = "runtime")]

use std::time::Duration;

use authwire_common::{should_retry, RetryDecision, RetryPolicy};
use authwire_domain::Classification;
use tokio::time::Instant;

/// Drive `policy` against `outcomes` the way a request loop would and return
/// the number of attempts made.
async fn run_loop(policy: RetryPolicy, outcomes: &[Classification]) -> (u32, Classification) {
    let mut state = policy.start();
    let mut outcomes = outcomes.iter().copied();
    loop {
        let outcome = outcomes.next().unwrap_or(Classification::Success);
        match should_retry(&state, outcome) {
            RetryDecision::RetryAfter(delay) => {
                tokio::time::sleep(delay).await;
                state.advance();
            }
            RetryDecision::NoRetry => return (state.attempts_made(), outcome),
        }
    }
}

/// Validates recovery after three transient failures.
///
/// Assertions:
/// - Four attempts are made
/// - Total sleep lies inside the summed envelopes of the first three retries
#[tokio::test(start_paused = true)]
async fn test_retry_recovers_within_envelope() {
    let policy =
        RetryPolicy::new(3, Duration::from_millis(1000), Duration::from_millis(8000), 0.2).unwrap();
    let transient = [Classification::TransientFailure; 3];

    let started = Instant::now();
    let (attempts, last) = run_loop(policy, &transient).await;
    let elapsed = started.elapsed();

    let (low, high) = (0..3).map(|a| policy.delay_envelope(a)).fold(
        (Duration::ZERO, Duration::ZERO),
        |(lo, hi), (l, h)| (lo + l, hi + h),
    );
    assert_eq!(attempts, 4);
    assert_eq!(last, Classification::Success);
    assert!(elapsed >= low && elapsed <= high, "{elapsed:?} outside {low:?}..{high:?}");
}

/// Validates that the loop gives up at the ceiling.
#[tokio::test(start_paused = true)]
async fn test_retry_stops_at_ceiling() {
    let policy =
        RetryPolicy::new(2, Duration::from_millis(100), Duration::from_millis(1000), 0.0).unwrap();
    let transient = [Classification::TransientFailure; 10];

    let started = Instant::now();
    let (attempts, last) = run_loop(policy, &transient).await;

    assert_eq!(attempts, 3);
    assert_eq!(last, Classification::TransientFailure);
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_not_retried() {
    let policy = RetryPolicy::default();
    let (attempts, last) = run_loop(policy, &[Classification::PermanentFailure]).await;

    assert_eq!(attempts, 1);
    assert_eq!(last, Classification::PermanentFailure);
}
