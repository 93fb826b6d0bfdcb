//! Request gateway behaviour against a mock HTTP backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logger, RecordingRedirect};
use futures_util::future;
use serde_json::json;
use tasklog_link::{
    LinkTimeouts, MemorySessionStore, RequestSpec, SessionStore, TaskLinkError, TaskLogClient,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    client: TaskLogClient,
    store: Arc<MemorySessionStore>,
    redirect: Arc<RecordingRedirect>,
}

fn harness(base_url: &str) -> Harness {
    init_logger();
    let store = Arc::new(MemorySessionStore::with_token("abc"));
    let redirect = RecordingRedirect::new();
    let timeouts = LinkTimeouts::builder()
        .request_timeout(Duration::from_secs(5))
        .expiry_quiet_window(Duration::from_secs(30))
        .build();
    let client = TaskLogClient::builder()
        .base_url(base_url)
        .timeouts(timeouts)
        .session_store(store.clone())
        .login_redirect(redirect.clone())
        .build()
        .unwrap();
    Harness {
        client,
        store,
        redirect,
    }
}

#[tokio::test]
async fn test_concurrent_expiry_redirects_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/task/ansible/1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/user/info"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    let gateway = h.client.gateway();

    let both = future::join(
        gateway.send(RequestSpec::get("task/ansible/1")),
        gateway.send(RequestSpec::get("task/ansible/1")),
    );
    // neither caller sees a result
    assert!(tokio::time::timeout(Duration::from_millis(500), both).await.is_err());

    assert_eq!(h.redirect.navigation_count(), 1);
    assert_eq!(h.redirect.notice_count(), 1);
    assert_eq!(h.redirect.notices.lock().unwrap()[0], "token expired");
    assert!(h.store.is_empty());
    assert_eq!(h.client.coordinator().episodes(), 1);

    let err = gateway.send(RequestSpec::get("user/info")).await.unwrap_err();
    assert!(matches!(err, TaskLinkError::RedirectInProgress));
}

#[tokio::test]
async fn test_expiry_body_code_on_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/task/ansible/2/log/3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 406, "message": "token invalid"})),
        )
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    let pending = h.client.gateway().send(RequestSpec::get("task/ansible/2/log/3"));
    assert!(tokio::time::timeout(Duration::from_millis(300), pending).await.is_err());

    assert_eq!(h.redirect.navigation_count(), 1);
    assert_eq!(h.redirect.notices.lock().unwrap()[0], "token invalid");
    assert!(h.client.coordinator().is_redirecting());
}

#[tokio::test]
async fn test_prefix_and_bearer_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/task/ansible/3/log/4"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 200, "data": {"content": "ok\n", "status": 3}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    let fetched = h.client.fetch_log(3, 4).await.unwrap();
    assert_eq!(fetched.snapshot.content, "ok\n");
    assert!(fetched.snapshot.completed);
    assert_eq!(fetched.attempts, 1);
}

#[tokio::test]
async fn test_explicit_authorization_header_wins() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/ping"))
        .and(header("authorization", "Bearer other"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    let response = h
        .client
        .gateway()
        .send(RequestSpec::get("/ping").header("Authorization", "Bearer other"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.raw, "pong");
}

#[tokio::test]
async fn test_no_token_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/ping"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri());
    h.store.clear_all().unwrap();
    h.client.gateway().send(RequestSpec::get("ping")).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let server = MockServer::start().await;
    Mock::given(path("/api/v1/task/ansible/9/log/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "work 9 not found"})))
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/task/ansible/5/log/5"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"code": 500, "msg": "database unavailable"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri());

    let err = h.client.fetch_log(9, 9).await.unwrap_err();
    assert!(matches!(err, TaskLinkError::NotFound(ref m) if m == "work 9 not found"), "{:?}", err);

    let err = h.client.fetch_log(5, 5).await.unwrap_err();
    match err {
        TaskLinkError::ServerError { status_code, message } => {
            assert_eq!(status_code, 500);
            assert_eq!(message, "database unavailable");
        },
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.redirect.navigation_count(), 0);
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let h = harness("http://127.0.0.1:9");
    let err = h.client.gateway().send(RequestSpec::get("ping")).await.unwrap_err();
    assert!(matches!(err, TaskLinkError::NetworkError(_)), "{:?}", err);
    assert!(err.is_transport());
}
