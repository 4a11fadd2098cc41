//! Session liveness bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_state_conversions;
use crate::types::credential::to_chrono;

/// Observable session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Warning,
    Expired,
}

impl_state_conversions!(SessionState {
    Active => "active",
    Warning => "warning",
    Expired => "expired",
});

/// Why the monitor ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// The absolute expiry deadline passed.
    Absolute,
    /// No activity for longer than the idle ceiling.
    Idle,
}

impl_state_conversions!(ExpiryReason {
    Absolute => "absolute",
    Idle => "idle",
});

/// Per-session clock owned by the session monitor.
///
/// `absolute_expiry_at` only ever moves forward for the lifetime of a
/// session. A new login builds a fresh clock via [`SessionClock::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClock {
    pub session_started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub absolute_expiry_at: DateTime<Utc>,
    pub warning_fired: bool,
}

impl SessionClock {
    /// Clock for a freshly authenticated session.
    #[must_use]
    pub fn start(
        now: DateTime<Utc>,
        credential_expires_at: DateTime<Utc>,
        max_lifetime: Option<Duration>,
    ) -> Self {
        let absolute = cap(credential_expires_at, now, max_lifetime);
        Self {
            session_started_at: now,
            last_activity_at: now,
            absolute_expiry_at: absolute,
            warning_fired: false,
        }
    }

    /// Clock after a successful refresh of the same session.
    ///
    /// The deadline never moves backwards and never passes the lifetime
    /// ceiling anchored at `session_started_at`. The warning re-arms only if
    /// the deadline actually moved.
    #[must_use]
    pub fn renewed(&self, credential_expires_at: DateTime<Utc>, max_lifetime: Option<Duration>) -> Self {
        let candidate = cap(credential_expires_at, self.session_started_at, max_lifetime);
        let absolute = candidate.max(self.absolute_expiry_at);
        Self {
            session_started_at: self.session_started_at,
            last_activity_at: self.last_activity_at,
            absolute_expiry_at: absolute,
            warning_fired: self.warning_fired && absolute == self.absolute_expiry_at,
        }
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }

    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity_at).to_std().unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_past_absolute(&self, now: DateTime<Utc>) -> bool {
        now >= self.absolute_expiry_at
    }

    #[must_use]
    pub fn in_warning_window(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now >= self.absolute_expiry_at - to_chrono(window)
    }

    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.absolute_expiry_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

fn cap(expires_at: DateTime<Utc>, anchor: DateTime<Utc>, max_lifetime: Option<Duration>) -> DateTime<Utc> {
    match max_lifetime {
        Some(limit) => expires_at.min(anchor + to_chrono(limit)),
        None => expires_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn start_caps_at_lifetime_ceiling() {
        let clock = SessionClock::start(t0(), t0() + secs(900), Some(Duration::from_secs(600)));
        assert_eq!(clock.absolute_expiry_at, t0() + secs(600));

        let clock = SessionClock::start(t0(), t0() + secs(900), None);
        assert_eq!(clock.absolute_expiry_at, t0() + secs(900));
    }

    #[test]
    fn renewal_never_moves_deadline_backwards() {
        let clock = SessionClock::start(t0(), t0() + secs(900), None);
        let renewed = clock.renewed(t0() + secs(300), None);
        assert_eq!(renewed.absolute_expiry_at, t0() + secs(900));

        let extended = clock.renewed(t0() + secs(1800), None);
        assert_eq!(extended.absolute_expiry_at, t0() + secs(1800));
        assert_eq!(extended.session_started_at, t0());
    }

    #[test]
    fn renewal_respects_ceiling_from_session_start() {
        let ceiling = Some(Duration::from_secs(1200));
        let clock = SessionClock::start(t0(), t0() + secs(900), ceiling);
        let renewed = clock.renewed(t0() + secs(1800), ceiling);
        assert_eq!(renewed.absolute_expiry_at, t0() + secs(1200));
    }

    #[test]
    fn renewal_rearms_warning_only_when_deadline_moves() {
        let mut clock = SessionClock::start(t0(), t0() + secs(900), None);
        clock.warning_fired = true;

        assert!(clock.renewed(t0() + secs(900), None).warning_fired);
        assert!(!clock.renewed(t0() + secs(1800), None).warning_fired);
    }

    #[test]
    fn warning_window_and_idle() {
        let mut clock = SessionClock::start(t0(), t0() + secs(900), None);
        let window = Duration::from_secs(300);
        assert!(!clock.in_warning_window(t0() + secs(599), window));
        assert!(clock.in_warning_window(t0() + secs(600), window));
        assert!(clock.is_past_absolute(t0() + secs(900)));

        clock.record_activity(t0() + secs(100));
        clock.record_activity(t0() + secs(50));
        assert_eq!(clock.idle_for(t0() + secs(160)), Duration::from_secs(60));
    }
}
