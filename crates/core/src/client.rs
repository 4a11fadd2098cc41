//! `AuthClient` facade
//!
//! Wires the token store, pipeline, refresh coordinator, retry policy and
//! session monitor into one handle. Every call goes through
//! [`AuthClient::send_with`]:
//!
//! 1. Bail out if the operation was cancelled or the session has ended
//! 2. Refresh ahead of time when the credential is inside the skew window
//! 3. Dispatch one attempt
//! 4. Auth failure: re-check the session, then hand over to the refresh
//!    coordinator (once per call)
//! 5. Transient failure: ask the retry policy, sleep, go to 1
//! 6. Anything else resolves the call

use std::sync::Arc;

use authwire_common::{should_retry, RetryDecision, RetryPolicy, SharedClock, SystemClock};
use authwire_domain::{
    ApiRequest, ApiResponse, Classification, ClientConfig, ClientError, Credential,
    LifecycleSignal, RefreshFailure, Result, SessionClock, SessionState,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::auth::ports::{CredentialStorage, RefreshClient};
use crate::auth::refresh::RefreshCoordinator;
use crate::auth::storage::MemoryCredentialStorage;
use crate::auth::token_store::TokenStore;
use crate::cancellation::{CancellationRegistry, OperationHandle};
use crate::http::dispatcher::{Attempt, Dispatcher, Outcome};
use crate::http::ports::Transport;
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::session::monitor::SessionMonitor;
use crate::signals::LifecycleSignals;

/// Authenticated, self-refreshing HTTP client
pub struct AuthClient {
    config: ClientConfig,
    store: Arc<TokenStore>,
    dispatcher: Arc<Dispatcher>,
    coordinator: Arc<RefreshCoordinator>,
    monitor: Arc<SessionMonitor>,
    retry: RetryPolicy,
    operations: CancellationRegistry,
    signals: LifecycleSignals,
    metrics: Arc<ClientMetrics>,
}

/// Builder for [`AuthClient`]
pub struct AuthClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    refresher: Option<Arc<dyn RefreshClient>>,
    durable: Option<Arc<dyn CredentialStorage>>,
    ephemeral: Option<Arc<dyn CredentialStorage>>,
    clock: Option<SharedClock>,
}

impl AuthClientBuilder {
    /// Start from `config`; the transport and refresh client are required.
    pub fn new(config: ClientConfig) -> Self {
        Self { config, transport: None, refresher: None, durable: None, ephemeral: None, clock: None }
    }

    /// Port that performs single HTTP attempts.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Port that exchanges a refresh token for a new credential.
    pub fn refresh_client(mut self, refresher: Arc<dyn RefreshClient>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Backend for `persist = true` logins. Defaults to memory.
    pub fn durable_storage(mut self, storage: Arc<dyn CredentialStorage>) -> Self {
        self.durable = Some(storage);
        self
    }

    /// Backend for `persist = false` logins. Defaults to memory.
    pub fn ephemeral_storage(mut self, storage: Arc<dyn CredentialStorage>) -> Self {
        self.ephemeral = Some(storage);
        self
    }

    /// Time source for expiry and session checks. Defaults to the system
    /// clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and assemble the client.
    ///
    /// # Errors
    /// `ClientError::Config` for invalid settings or a missing transport or
    /// refresh client.
    pub fn build(self) -> Result<AuthClient> {
        self.config.validate()?;
        let retry = RetryPolicy::from_settings(&self.config.retry)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        let transport =
            self.transport.ok_or_else(|| ClientError::Config("transport is required".into()))?;
        let refresher = self
            .refresher
            .ok_or_else(|| ClientError::Config("refresh client is required".into()))?;

        let clock: SharedClock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let durable = self.durable.unwrap_or_else(|| Arc::new(MemoryCredentialStorage::new()));
        let ephemeral = self.ephemeral.unwrap_or_else(|| Arc::new(MemoryCredentialStorage::new()));

        let store = Arc::new(TokenStore::new(durable, ephemeral, clock.clone()));
        let signals = LifecycleSignals::default();
        let metrics = Arc::new(ClientMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(
            transport,
            store.clone(),
            self.config.base_url.clone(),
            self.config.request_timeout(),
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            refresher,
            dispatcher.clone(),
            signals.clone(),
            metrics.clone(),
            self.config.request_timeout(),
        ));
        let monitor = Arc::new(SessionMonitor::new(
            store.clone(),
            clock,
            self.config.session.clone(),
            signals.clone(),
            metrics.clone(),
        ));

        Ok(AuthClient {
            config: self.config,
            store,
            dispatcher,
            coordinator,
            monitor,
            retry,
            operations: CancellationRegistry::new(),
            signals,
            metrics,
        })
    }
}

impl AuthClient {
    /// Shorthand for [`AuthClientBuilder::new`].
    pub fn builder(config: ClientConfig) -> AuthClientBuilder {
        AuthClientBuilder::new(config)
    }

    /// Validated configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The single owner of the current credential.
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Refresh coordinator shared by every request of this client.
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Install a credential obtained by the host's sign-in flow.
    ///
    /// # Errors
    /// `ClientError::InvalidCredential` when the credential is inconsistent.
    pub fn login(&self, credential: Credential, persist: bool) -> Result<()> {
        self.store.set(credential, persist)?;
        self.monitor.tick();
        info!(persist, "logged in");
        Ok(())
    }

    /// Restore a credential persisted by a previous run. Returns whether one
    /// was found.
    pub fn restore_session(&self) -> bool {
        let restored = self.store.load_persisted().is_some();
        if restored {
            self.monitor.tick();
        }
        restored
    }

    /// Explicit sign-out: clears the credential and the session clock. No
    /// lifecycle signal is emitted.
    pub fn logout(&self) {
        self.store.clear();
        self.monitor.reset();
        info!("logged out");
    }

    /// Whether a credential is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Start a cancellable operation; supersedes the previous one under `key`.
    pub fn begin_operation(&self, key: impl Into<String>) -> OperationHandle {
        self.operations.begin(key)
    }

    /// Mark an operation as done so its key slot is released.
    pub fn end_operation(&self, handle: &OperationHandle) {
        self.operations.finish(handle);
    }

    /// Receive lifecycle signals (warning, expiry, refresh failure).
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal> {
        self.signals.subscribe()
    }

    /// Session state as of the last evaluation.
    pub fn session_state(&self) -> SessionState {
        self.monitor.state()
    }

    /// Clock of the tracked session, if any.
    pub fn session_clock(&self) -> Option<SessionClock> {
        self.monitor.session_clock()
    }

    /// Explicit UI interaction, counted towards the idle ceiling.
    pub fn record_activity(&self) {
        self.monitor.record_activity();
    }

    /// Point-in-time copy of the client counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run the session monitor in the background until `cancel` fires.
    pub fn start_session_monitor(&self, cancel: CancellationToken) -> JoinHandle<()> {
        Arc::clone(&self.monitor).spawn(cancel)
    }

    /// Evaluate the session once, outside the background schedule.
    pub fn check_session(&self) -> SessionState {
        self.monitor.tick()
    }

    /// Extend the session by refreshing the credential now.
    ///
    /// # Errors
    /// `AuthInvalid` when not signed in, the session already ended, or the
    /// refresh is rejected.
    pub async fn extend_session(&self) -> Result<SessionState> {
        if self.session_ended() {
            return Err(ClientError::auth_invalid(RefreshFailure::SessionEnded));
        }
        self.coordinator.force_refresh(&CancellationToken::new()).await?;
        Ok(self.monitor.tick())
    }

    /// Send a request outside any named operation.
    ///
    /// # Errors
    /// See [`AuthClient::send_with`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.send_with(request, &OperationHandle::detached()).await
    }

    /// Send a request under an operation handle.
    ///
    /// # Errors
    /// - `AuthInvalid` on terminal authentication failure
    /// - `RetryExhausted` once transient failures use up the retry ceiling
    /// - `Permanent` for other 4xx responses
    /// - `Cancelled` when the handle is cancelled
    #[instrument(skip_all, fields(method = request.method.as_str(), path = %request.path))]
    pub async fn send_with(&self, request: ApiRequest, handle: &OperationHandle) -> Result<ApiResponse> {
        self.metrics.record_request();
        let result = self.run(&request, handle.token()).await;
        if let Err(ClientError::Cancelled) = &result {
            self.metrics.record_cancellation();
            debug!("request cancelled");
        }
        result
    }

    /// Evaluate the session deadlines before the credential is used or
    /// renewed. Unauthenticated calls are never blocked.
    fn session_ended(&self) -> bool {
        self.store.get().is_some() && self.monitor.tick() == SessionState::Expired
    }

    async fn run(&self, request: &ApiRequest, cancel: &CancellationToken) -> Result<ApiResponse> {
        let mut retry = self.retry.start();
        let mut refreshed = false;

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            if self.session_ended() {
                return Err(ClientError::auth_invalid(RefreshFailure::SessionEnded));
            }
            if self.store.get().is_some() && self.store.is_expired(self.config.refresh_skew()) {
                debug!("credential inside refresh window; refreshing before send");
                self.coordinator.ensure_fresh(self.config.refresh_skew(), cancel).await?;
            }

            self.monitor.record_activity();
            let mut attempt = self.dispatcher.dispatch(request, cancel).await;
            if matches!(attempt.outcome, Outcome::AuthFailure(_)) && !refreshed {
                if self.session_ended() {
                    return Err(ClientError::auth_invalid(RefreshFailure::SessionEnded));
                }
                refreshed = true;
                attempt = self.coordinator.refresh_and_replay(request, attempt.generation, cancel).await?;
            }

            let Attempt { outcome, .. } = attempt;
            match outcome {
                Outcome::Success(response) => return Ok(response),
                Outcome::AuthFailure(response) => {
                    warn!(status = response.status, "request rejected after refresh");
                    return Err(ClientError::auth_invalid(RefreshFailure::RejectedAfterRefresh));
                }
                Outcome::Permanent(err) => return Err(err),
                Outcome::Cancelled => return Err(ClientError::Cancelled),
                Outcome::Transient(cause) => {
                    let delay = match should_retry(&retry, Classification::TransientFailure) {
                        RetryDecision::RetryAfter(delay) => delay,
                        RetryDecision::NoRetry => {
                            warn!(attempts = retry.attempts_made(), cause = %cause, "retries exhausted");
                            return Err(ClientError::RetryExhausted {
                                attempts: retry.attempts_made(),
                                last: cause,
                            });
                        }
                    };
                    warn!(
                        attempt = retry.attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        cause = %cause,
                        "transient failure; retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ClientError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    retry.advance();
                    self.metrics.record_retry();
                }
            }
        }
    }
}
