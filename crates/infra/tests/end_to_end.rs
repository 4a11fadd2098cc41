//! End-to-end scenarios against a wiremock server using the production
//! transport, refresh client and storage.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authwire_domain::{ApiRequest, ClientError, LifecycleSignal, RefreshFailure, TransientCause};
use authwire_infra::build_client;
use futures::future::join_all;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{config_for, fresh_credential, grant_body, requests_with_token, REFRESH_PATH};

async fn mount_protected_items(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("items"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

#[tokio::test]
async fn concurrent_401s_trigger_a_single_refresh() {
    let server = MockServer::start().await;
    mount_protected_items(&server, "new").await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(serde_json::json!({ "refresh_token": "old-refresh" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(grant_body("new"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(config_for(&server)).unwrap();
    client.login(fresh_credential("old"), false).unwrap();

    let sends = (0..5).map(|i| client.send(ApiRequest::get(format!("/items/{i}"))));
    for result in join_all(sends).await {
        let response = result.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "items");
    }

    assert_eq!(requests_with_token(&server, "old").await, 5);
    assert_eq!(requests_with_token(&server, "new").await, 5);
    assert_eq!(client.metrics().refresh_calls, 1);
    assert_eq!(client.token_store().get().unwrap().refresh_token, "new-refresh");
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(move |_req: &wiremock::Request| {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200)
            }
        })
        .mount(&server)
        .await;

    let client = build_client(config_for(&server)).unwrap();
    client.login(fresh_credential("tok"), false).unwrap();

    let response = client.send(ApiRequest::get("/report")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(client.metrics().retries, 3);
}

#[tokio::test]
async fn persistent_outage_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.retry.max_retries = 2;
    let client = build_client(config).unwrap();

    let err = client.send(ApiRequest::get("/down")).await.unwrap_err();

    assert_eq!(err, ClientError::RetryExhausted { attempts: 3, last: TransientCause::Status(502) });
}

#[tokio::test]
async fn rejected_refresh_signs_out() {
    let server = MockServer::start().await;
    mount_protected_items(&server, "new").await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(config_for(&server)).unwrap();
    let mut signals = client.subscribe();
    client.login(fresh_credential("old"), false).unwrap();

    let err = client.send(ApiRequest::get("/items")).await.unwrap_err();

    assert_eq!(err, ClientError::auth_invalid(RefreshFailure::Rejected { status: 401 }));
    assert!(!client.is_authenticated());
    assert_eq!(
        signals.recv().await.unwrap(),
        LifecycleSignal::RefreshFailed { reason: RefreshFailure::Rejected { status: 401 } }
    );
}

#[tokio::test]
async fn malformed_refresh_body_is_terminal() {
    let server = MockServer::start().await;
    mount_protected_items(&server, "new").await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = build_client(config_for(&server)).unwrap();
    client.login(fresh_credential("old"), false).unwrap();

    let err = client.send(ApiRequest::get("/items")).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::AuthInvalid { reason: RefreshFailure::MalformedResponse(_) }
    ));
}

#[tokio::test]
async fn persisted_session_is_restored_from_file() {
    let server = MockServer::start().await;
    mount_protected_items(&server, "tok").await;
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = config_for(&server);
    config.storage.path = Some(dir.path().join("credential.json"));

    let first = build_client(config.clone()).unwrap();
    first.login(fresh_credential("tok"), true).unwrap();
    drop(first);

    let second = build_client(config).unwrap();
    assert!(second.is_authenticated());
    assert_eq!(second.send(ApiRequest::get("/items")).await.unwrap().status, 200);

    second.logout();
    assert!(!dir.path().join("credential.json").exists());
}
