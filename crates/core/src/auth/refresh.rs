//! Refresh coordinator
//!
//! Turns any number of concurrent auth failures into a single refresh call:
//! - The first failure opens an episode and spawns the refresh task
//! - Later failures join the episode's FIFO waiter queue
//! - On success every waiter is resubmitted once, first-polled in queue order
//! - On failure the store is cleared once and every waiter fails terminally
//!
//! The episode lives behind a `parking_lot::Mutex` that is never held across
//! an `.await`. The refresh runs on its own task so a cancelled leader does
//! not strand the waiters queued behind it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authwire_common::Clock;
use authwire_domain::{
    impl_state_conversions, ApiRequest, ClientError, Credential, LifecycleSignal, RefreshFailure,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::RefreshClient;
use super::token_store::{TokenSnapshot, TokenStore};
use crate::http::dispatcher::{Attempt, Dispatcher};
use crate::metrics::ClientMetrics;
use crate::signals::LifecycleSignals;

/// Phase of the current refresh episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeState {
    Idle,
    Inflight,
    Succeeded,
    Failed,
}

impl_state_conversions!(EpisodeState {
    Idle => "idle",
    Inflight => "inflight",
    Succeeded => "succeeded",
    Failed => "failed",
});

/// What a waiter receives when its episode settles: the replayed attempt,
/// `None` for waiters that only wanted a fresh credential, or the terminal
/// error.
type Delivery = Result<Option<Attempt>, ClientError>;

enum WaiterKind {
    Replay { request: ApiRequest, cancel: CancellationToken },
    Notify,
}

struct Waiter {
    ticket: u64,
    kind: WaiterKind,
    tx: oneshot::Sender<Delivery>,
}

struct Episode {
    id: u64,
    state: EpisodeState,
    started_at: Option<DateTime<Utc>>,
    waiters: VecDeque<Waiter>,
}

enum Admission {
    Waiting(u64, oneshot::Receiver<Delivery>),
    Proceed,
    Reject(ClientError),
}

/// Single-flight refresh with request replay
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    refresher: Arc<dyn RefreshClient>,
    dispatcher: Arc<Dispatcher>,
    signals: LifecycleSignals,
    metrics: Arc<ClientMetrics>,
    timeout: Duration,
    episode: Mutex<Episode>,
    next_ticket: AtomicU64,
}

impl RefreshCoordinator {
    /// Create a coordinator
    ///
    /// `timeout` bounds the refresh call itself.
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn RefreshClient>,
        dispatcher: Arc<Dispatcher>,
        signals: LifecycleSignals,
        metrics: Arc<ClientMetrics>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            dispatcher,
            signals,
            metrics,
            timeout,
            episode: Mutex::new(Episode {
                id: 0,
                state: EpisodeState::Idle,
                started_at: None,
                waiters: VecDeque::new(),
            }),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Current episode phase.
    pub fn state(&self) -> EpisodeState {
        self.episode.lock().state
    }

    /// When the inflight episode started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.episode.lock().started_at
    }

    /// Waiters queued on the inflight episode
    pub fn waiting(&self) -> usize {
        self.episode.lock().waiters.len()
    }

    /// Handle an auth failure for `request`, whose failed attempt was sent
    /// with credential generation `failed_generation`.
    ///
    /// Returns the replayed attempt. A request that failed with an outdated
    /// credential is replayed immediately without a refresh.
    ///
    /// # Errors
    /// `AuthInvalid` when there is no credential, the refresh fails or the
    /// session ends meanwhile; `Cancelled` when `cancel` fires first.
    #[instrument(skip(self, request, cancel))]
    pub async fn refresh_and_replay(
        self: &Arc<Self>,
        request: &ApiRequest,
        failed_generation: u64,
        cancel: &CancellationToken,
    ) -> Result<Attempt, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let admission = {
            let mut episode = self.episode.lock();
            let snapshot = self.store.snapshot();
            if snapshot.credential.is_none() {
                Admission::Reject(ClientError::auth_invalid(RefreshFailure::NotAuthenticated))
            } else if episode.state != EpisodeState::Inflight
                && snapshot.generation != failed_generation
            {
                debug!(current = snapshot.generation, "credential already replaced");
                Admission::Proceed
            } else {
                let kind = WaiterKind::Replay { request: request.clone(), cancel: cancel.clone() };
                let (ticket, rx) = self.enlist(&mut episode, &snapshot, kind);
                Admission::Waiting(ticket, rx)
            }
        };

        match admission {
            Admission::Reject(err) => Err(err),
            Admission::Proceed => {
                self.metrics.record_replay();
                Ok(self.dispatcher.dispatch(request, cancel).await)
            }
            Admission::Waiting(ticket, rx) => match self.wait(ticket, rx, cancel).await? {
                Some(attempt) => Ok(attempt),
                None => Err(ClientError::Cancelled),
            },
        }
    }

    /// Refresh ahead of time when the credential is within `skew` of expiry,
    /// or join the inflight episode.
    ///
    /// With no credential there is nothing to refresh and the call succeeds.
    ///
    /// # Errors
    /// `AuthInvalid` when the refresh fails, `Cancelled` when `cancel` fires.
    pub async fn ensure_fresh(
        self: &Arc<Self>,
        skew: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.join_or_start(Some(skew), cancel).await
    }

    /// Refresh now regardless of the expiry deadline (session extension).
    ///
    /// # Errors
    /// `AuthInvalid(NotAuthenticated)` without a credential, otherwise as
    /// [`RefreshCoordinator::ensure_fresh`].
    pub async fn force_refresh(self: &Arc<Self>, cancel: &CancellationToken) -> Result<(), ClientError> {
        self.join_or_start(None, cancel).await
    }

    async fn join_or_start(
        self: &Arc<Self>,
        skew: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let admission = {
            let mut episode = self.episode.lock();
            let snapshot = self.store.snapshot();
            let now = self.store.clock().now();
            match (snapshot.credential.as_ref(), skew) {
                (None, Some(_)) => Admission::Proceed,
                (None, None) => {
                    Admission::Reject(ClientError::auth_invalid(RefreshFailure::NotAuthenticated))
                }
                (Some(credential), Some(skew))
                    if episode.state != EpisodeState::Inflight
                        && !credential.is_expired_at(now, skew) =>
                {
                    Admission::Proceed
                }
                (Some(_), _) => {
                    let (ticket, rx) = self.enlist(&mut episode, &snapshot, WaiterKind::Notify);
                    Admission::Waiting(ticket, rx)
                }
            }
        };

        match admission {
            Admission::Reject(err) => Err(err),
            Admission::Proceed => Ok(()),
            Admission::Waiting(ticket, rx) => self.wait(ticket, rx, cancel).await.map(|_| ()),
        }
    }

    /// Queue a waiter; open an episode if none is inflight. Called with the
    /// episode lock held.
    fn enlist(
        self: &Arc<Self>,
        episode: &mut Episode,
        snapshot: &TokenSnapshot,
        kind: WaiterKind,
    ) -> (u64, oneshot::Receiver<Delivery>) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        episode.waiters.push_back(Waiter { ticket, kind, tx });

        if episode.state == EpisodeState::Inflight {
            debug!(episode = episode.id, ticket, waiting = episode.waiters.len(), "joined refresh");
            return (ticket, rx);
        }

        episode.id += 1;
        episode.state = EpisodeState::Inflight;
        episode.started_at = Some(self.store.clock().now());
        let id = episode.id;
        let generation = snapshot.generation;
        let refresh_token =
            snapshot.credential.as_ref().map(|c| c.refresh_token.clone()).unwrap_or_default();
        info!(episode = id, generation, "refresh episode started");

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_episode(id, generation, refresh_token).await });
        (ticket, rx)
    }

    async fn wait(
        &self,
        ticket: u64,
        rx: oneshot::Receiver<Delivery>,
        cancel: &CancellationToken,
    ) -> Delivery {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.withdraw(ticket);
                Err(ClientError::Cancelled)
            }
            delivered = rx => delivered.unwrap_or_else(|_| {
                Err(ClientError::auth_invalid(RefreshFailure::Network(
                    "refresh task ended unexpectedly".into(),
                )))
            }),
        }
    }

    fn withdraw(&self, ticket: u64) {
        let mut episode = self.episode.lock();
        let before = episode.waiters.len();
        episode.waiters.retain(|waiter| waiter.ticket != ticket);
        if episode.waiters.len() < before {
            debug!(ticket, "cancelled waiter left the refresh queue");
        }
    }

    async fn run_episode(self: Arc<Self>, id: u64, generation: u64, refresh_token: String) {
        match self.call_refresh(&refresh_token).await {
            Ok(credential) => self.settle_success(id, generation, credential).await,
            Err(reason) => self.settle_failure(id, generation, reason).await,
        }
        self.finish(id);
    }

    async fn call_refresh(&self, refresh_token: &str) -> Result<Credential, RefreshFailure> {
        if refresh_token.is_empty() {
            return Err(RefreshFailure::MissingRefreshToken);
        }
        self.metrics.record_refresh_call();
        let grant = tokio::time::timeout(self.timeout, self.refresher.refresh(refresh_token))
            .await
            .map_err(|_| {
                RefreshFailure::Network(format!(
                    "refresh timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;
        grant.into_credential(self.store.clock().now())
    }

    async fn settle_success(&self, id: u64, generation: u64, credential: Credential) {
        let replaced = self.store.replace_if_generation(generation, credential);
        let (waiters, failure) = {
            let mut episode = self.episode.lock();
            let failure = match replaced {
                Some(next) => {
                    info!(episode = id, generation = next, "refresh succeeded");
                    None
                }
                None if self.store.get().is_some() => {
                    debug!(episode = id, "credential changed during refresh; replaying with it");
                    None
                }
                None => {
                    warn!(episode = id, "session ended during refresh; discarding new credential");
                    Some(RefreshFailure::SessionEnded)
                }
            };
            episode.state =
                if failure.is_none() { EpisodeState::Succeeded } else { EpisodeState::Failed };
            (std::mem::take(&mut episode.waiters), failure)
        };

        match failure {
            None => self.replay(waiters).await,
            Some(reason) => Self::reject(waiters, &reason),
        }
    }

    async fn settle_failure(&self, id: u64, generation: u64, reason: RefreshFailure) {
        self.metrics.record_refresh_failure();
        let cleared = self.store.clear_if_generation(generation);
        let (waiters, replay) = {
            let mut episode = self.episode.lock();
            let replay = !cleared && self.store.get().is_some();
            episode.state = if replay { EpisodeState::Succeeded } else { EpisodeState::Failed };
            (std::mem::take(&mut episode.waiters), replay)
        };

        if cleared {
            warn!(episode = id, reason = %reason, "refresh failed; credential cleared");
            self.metrics.record_forced_sign_out();
            self.signals.emit(LifecycleSignal::RefreshFailed { reason: reason.clone() });
        }

        if replay {
            debug!(episode = id, "refresh failed but a new credential was installed meanwhile");
            self.replay(waiters).await;
        } else {
            Self::reject(waiters, &reason);
        }
    }

    // join_all polls every replay once in queue order before any completes,
    // so transport calls start in FIFO order.
    async fn replay(&self, waiters: VecDeque<Waiter>) {
        let replays = waiters.into_iter().map(|waiter| async move {
            if waiter.tx.is_closed() {
                return;
            }
            let delivery = match waiter.kind {
                WaiterKind::Notify => Ok(None),
                WaiterKind::Replay { request, cancel } => {
                    if cancel.is_cancelled() {
                        Err(ClientError::Cancelled)
                    } else {
                        self.metrics.record_replay();
                        Ok(Some(self.dispatcher.dispatch(&request, &cancel).await))
                    }
                }
            };
            let _ = waiter.tx.send(delivery);
        });
        join_all(replays).await;
    }

    fn reject(waiters: VecDeque<Waiter>, reason: &RefreshFailure) {
        for waiter in waiters {
            let _ = waiter.tx.send(Err(ClientError::auth_invalid(reason.clone())));
        }
    }

    fn finish(&self, id: u64) {
        let mut episode = self.episode.lock();
        if episode.id == id && episode.state != EpisodeState::Inflight {
            episode.state = EpisodeState::Idle;
            episode.started_at = None;
        }
    }
}
