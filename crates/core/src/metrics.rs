//! Client counters
//!
//! Plain atomics read by hosts through [`ClientMetrics::snapshot`]. Counters
//! only move when the event actually happened: a retry is counted when it is
//! sent, not when it is scheduled.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters updated by the pipeline, coordinator and monitor.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    requests: AtomicU64,
    retries: AtomicU64,
    refresh_calls: AtomicU64,
    refresh_failures: AtomicU64,
    replays: AtomicU64,
    cancellations: AtomicU64,
    forced_sign_outs: AtomicU64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub retries: u64,
    pub refresh_calls: u64,
    pub refresh_failures: u64,
    pub replays: u64,
    pub cancellations: u64,
    pub forced_sign_outs: u64,
}

impl ClientMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A call entered the pipeline.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// A backoff sleep completed.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// The refresh endpoint was contacted.
    pub fn record_refresh_call(&self) {
        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// A refresh episode failed.
    pub fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A waiter was resubmitted after a refresh.
    pub fn record_replay(&self) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    /// A call resolved as cancelled.
    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// The credential was cleared by a failure or expiry.
    pub fn record_forced_sign_out(&self) {
        self.forced_sign_outs.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters for reporting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            refresh_calls: self.refresh_calls.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            forced_sign_outs: self.forced_sign_outs.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = ClientMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_retry();
        metrics.record_refresh_call();
        metrics.record_forced_sign_out();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.refresh_calls, 1);
        assert_eq!(snapshot.refresh_failures, 0);
        assert_eq!(snapshot.forced_sign_outs, 1);

        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["requests"], 2);
    }
}
