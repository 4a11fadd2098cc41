//! Shared test helpers for `authwire-core` integration tests.
//!
//! Scripted fakes for the transport and refresh ports plus a harness that
//! wires them into an `AuthClient` driven by a `MockClock`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authwire_common::testing::MockClock;
use authwire_common::Clock;
use authwire_core::{AuthClient, RefreshClient, Transport, TransportError};
use authwire_domain::{
    ApiRequest, ApiResponse, ClientConfig, Credential, RefreshFailure, RefreshGrant,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

type Responder = dyn Fn(&ApiRequest, usize) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport whose answers come from a closure of (request, call index).
pub struct ScriptedTransport {
    responder: Box<Responder>,
    latency: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&ApiRequest, usize) -> Result<ApiResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 200 for `Bearer <token>`, 401 for anything else.
    pub fn accepting(token: &str) -> Self {
        let expected = format!("Bearer {token}");
        Self::new(move |request, _| {
            if request.header_value("authorization") == Some(expected.as_str()) {
                Ok(ApiResponse::new(200).with_body(request.path.clone()))
            } else {
                Ok(ApiResponse::new(401))
            }
        })
    }

    /// Always answers with `status`.
    pub fn status(status: u16) -> Self {
        Self::new(move |_, _| Ok(ApiResponse::new(status)))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<ApiRequest> {
        self.seen.lock().clone()
    }

    /// Paths of requests sent with `Bearer <token>`, in send order.
    pub fn paths_with_token(&self, token: &str) -> Vec<String> {
        let expected = format!("Bearer {token}");
        self.seen
            .lock()
            .iter()
            .filter(|r| r.header_value("authorization") == Some(expected.as_str()))
            .map(|r| r.path.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(&request, index)
    }
}

/// Refresh endpoint that plays back queued outcomes.
pub struct ScriptedRefresher {
    outcomes: Mutex<VecDeque<Result<RefreshGrant, RefreshFailure>>>,
    latency: Duration,
    calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedRefresher {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn granting(self, grant: RefreshGrant) -> Self {
        self.outcomes.lock().push_back(Ok(grant));
        self
    }

    pub fn failing(self, reason: RefreshFailure) -> Self {
        self.outcomes.lock().push_back(Err(reason));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl RefreshClient for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, RefreshFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().push(refresh_token.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RefreshFailure::Network("no scripted outcome".into())))
    }
}

/// Instant `secs` after the harness clock's starting point.
pub fn at(secs: i64) -> DateTime<Utc> {
    MockClock::epoch().now() + chrono::Duration::seconds(secs)
}

pub fn grant(access: &str, expires_at: DateTime<Utc>) -> RefreshGrant {
    RefreshGrant {
        access_token: access.to_string(),
        refresh_token: format!("{access}-refresh"),
        token_type: "Bearer".to_string(),
        expires_at,
    }
}

pub fn credential(clock: &MockClock, access: &str, lifetime: Duration) -> Credential {
    Credential::bearer(access, format!("{access}-refresh"), clock.now(), lifetime)
        .expect("valid test credential")
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

pub fn config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.base_url = "https://api.test".to_string();
    config.refresh_url = "https://api.test/auth/refresh".to_string();
    config
}

pub struct Harness {
    pub client: Arc<AuthClient>,
    pub clock: MockClock,
    pub transport: Arc<ScriptedTransport>,
    pub refresher: Arc<ScriptedRefresher>,
}

pub fn harness_with(
    config: ClientConfig,
    transport: ScriptedTransport,
    refresher: ScriptedRefresher,
) -> Harness {
    let clock = MockClock::epoch();
    let transport = Arc::new(transport);
    let refresher = Arc::new(refresher);
    let client = AuthClient::builder(config)
        .transport(transport.clone())
        .refresh_client(refresher.clone())
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("client builds");
    Harness { client: Arc::new(client), clock, transport, refresher }
}

pub fn harness(transport: ScriptedTransport, refresher: ScriptedRefresher) -> Harness {
    harness_with(config(), transport, refresher)
}
