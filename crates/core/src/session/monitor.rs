//! Session monitor
//!
//! Periodically evaluates the current session against its absolute deadline
//! and the idle ceiling:
//! - `Active -> Warning` once `now >= absolute_expiry_at - warning_window`,
//!   emitting `SessionWarning` once per clock
//! - `Warning -> Active` when a refresh moves the deadline later
//! - `* -> Expired` once the deadline passes or the session sits idle too
//!   long; the store is cleared and `SessionExpired` emitted
//!
//! [`SessionMonitor::tick`] is the deterministic, clock-driven evaluation;
//! [`SessionMonitor::spawn`] runs it on a tokio interval until cancelled.

use std::sync::Arc;

use authwire_common::{Clock, SharedClock};
use authwire_domain::{ExpiryReason, LifecycleSignal, SessionClock, SessionSettings, SessionState};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::auth::token_store::{TokenSnapshot, TokenStore};
use crate::metrics::ClientMetrics;
use crate::signals::LifecycleSignals;

#[derive(Debug, Clone)]
struct Tracked {
    session_id: u64,
    generation: u64,
    clock: SessionClock,
    state: SessionState,
}

/// Tracks the clock of the current session and ends it once a deadline
/// passes.
///
/// Shared between the client (activity, on-demand evaluation) and the
/// background task started by [`SessionMonitor::spawn`].
pub struct SessionMonitor {
    store: Arc<TokenStore>,
    clock: SharedClock,
    settings: SessionSettings,
    signals: LifecycleSignals,
    metrics: Arc<ClientMetrics>,
    tracked: Mutex<Option<Tracked>>,
}

impl SessionMonitor {
    /// Monitor for the credential held in `store`. Nothing is tracked until
    /// the first [`SessionMonitor::tick`].
    pub fn new(
        store: Arc<TokenStore>,
        clock: SharedClock,
        settings: SessionSettings,
        signals: LifecycleSignals,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self { store, clock, settings, signals, metrics, tracked: Mutex::new(None) }
    }

    /// Note user or network activity for the idle ceiling.
    ///
    /// A clock already idle past the ceiling is left untouched so the next
    /// evaluation still ends the session.
    pub fn record_activity(&self) {
        let now = self.clock.now();
        let idle_limit = self.settings.idle_timeout();
        if let Some(tracked) = self.tracked.lock().as_mut() {
            if idle_limit.is_some_and(|limit| tracked.clock.idle_for(now) >= limit) {
                debug!("idle ceiling already passed; activity ignored");
                return;
            }
            tracked.clock.record_activity(now);
        }
    }

    /// State as of the last evaluation; `Expired` when no session is tracked.
    pub fn state(&self) -> SessionState {
        self.tracked.lock().as_ref().map_or(SessionState::Expired, |t| t.state)
    }

    /// Clock of the tracked session, if any.
    pub fn session_clock(&self) -> Option<SessionClock> {
        self.tracked.lock().as_ref().map(|t| t.clock.clone())
    }

    /// Forget the tracked session (explicit logout).
    pub fn reset(&self) {
        *self.tracked.lock() = None;
    }

    /// Evaluate the session once.
    ///
    /// If the credential changes between reading it and trying to clear it,
    /// the evaluation is repeated once against the new credential.
    pub fn tick(&self) -> SessionState {
        self.evaluate().or_else(|| self.evaluate()).unwrap_or_else(|| self.state())
    }

    /// Run [`SessionMonitor::tick`] every `check_interval` until `cancel`
    /// fires. Missed ticks (device sleep) collapse into one.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    #[instrument(skip_all, fields(interval_secs = self.settings.check_interval_secs))]
    async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.check_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(event = "monitor_started", "session monitor started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(event = "monitor_cancelled", "session monitor stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// `None` means the store changed under us and the caller should retry.
    fn evaluate(&self) -> Option<SessionState> {
        let snapshot = self.store.snapshot();
        let now = self.clock.now();
        let mut guard = self.tracked.lock();

        let Some(credential) = snapshot.credential.as_ref() else {
            *guard = None;
            return Some(SessionState::Expired);
        };

        let max_lifetime = self.settings.max_lifetime();
        let tracked = match guard.take() {
            Some(prev) if prev.session_id == snapshot.session_id => {
                if prev.generation == snapshot.generation {
                    prev
                } else if prev.clock.is_past_absolute(now) {
                    debug!("credential replaced after the session deadline; not renewing");
                    Tracked { generation: snapshot.generation, ..prev }
                } else {
                    let clock = prev.clock.renewed(credential.expires_at, max_lifetime);
                    debug!(
                        expires_at = %clock.absolute_expiry_at,
                        "session clock renewed after refresh"
                    );
                    Tracked { generation: snapshot.generation, clock, ..prev }
                }
            }
            _ => {
                let clock = SessionClock::start(now, credential.expires_at, max_lifetime);
                info!(expires_at = %clock.absolute_expiry_at, "tracking new session");
                Tracked {
                    session_id: snapshot.session_id,
                    generation: snapshot.generation,
                    clock,
                    state: SessionState::Active,
                }
            }
        };

        let expiry = if tracked.clock.is_past_absolute(now) {
            Some(ExpiryReason::Absolute)
        } else if self
            .settings
            .idle_timeout()
            .is_some_and(|limit| tracked.clock.idle_for(now) >= limit)
        {
            Some(ExpiryReason::Idle)
        } else {
            None
        };

        if let Some(reason) = expiry {
            return self.expire(&mut guard, tracked, &snapshot, reason);
        }

        let mut tracked = tracked;
        if tracked.clock.in_warning_window(now, self.settings.warning_window()) {
            if !tracked.clock.warning_fired {
                tracked.clock.warning_fired = true;
                let remaining = tracked.clock.remaining(now);
                info!(remaining_secs = remaining.as_secs(), "session entering warning window");
                self.signals.emit(LifecycleSignal::SessionWarning {
                    expires_at: tracked.clock.absolute_expiry_at,
                    remaining_secs: remaining.as_secs(),
                });
            }
            tracked.state = SessionState::Warning;
        } else {
            tracked.state = SessionState::Active;
        }

        let state = tracked.state;
        *guard = Some(tracked);
        Some(state)
    }

    fn expire(
        &self,
        guard: &mut Option<Tracked>,
        tracked: Tracked,
        snapshot: &TokenSnapshot,
        reason: ExpiryReason,
    ) -> Option<SessionState> {
        if !self.store.clear_if_generation(snapshot.generation) {
            *guard = Some(tracked);
            return None;
        }
        *guard = None;
        info!(reason = %reason, "session expired; credential cleared");
        self.metrics.record_forced_sign_out();
        self.signals.emit(LifecycleSignal::SessionExpired { reason });
        Some(SessionState::Expired)
    }
}
