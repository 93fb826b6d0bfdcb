//! Snapshot retrieval: escalating budget and the direct path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logger, RecordingRedirect};
use serde_json::json;
use tasklog_link::{LinkTimeouts, MemorySessionStore, TaskLinkError, TaskLogClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOG_PATH: &str = "/api/v1/task/ansible/42/log/7";

fn client(base_url: &str, first: Duration, retry: Duration, direct: Duration) -> TaskLogClient {
    init_logger();
    let timeouts = LinkTimeouts::builder()
        .first_attempt_timeout(first)
        .retry_timeout(retry)
        .direct_timeout(direct)
        .build();
    TaskLogClient::builder()
        .base_url(base_url)
        .timeouts(timeouts)
        .session_store(Arc::new(MemorySessionStore::with_token("abc")))
        .login_redirect(RecordingRedirect::new())
        .build()
        .unwrap()
}

fn log_body(content: &str) -> serde_json::Value {
    json!({"code": 200, "message": "ok", "data": {"content": content, "status": 2}})
}

#[tokio::test]
async fn test_first_timeout_is_retried_with_long_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(log_body("slow")).set_delay(Duration::from_millis(800)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LOG_PATH))
        .and(query_param("realtime", "true"))
        .and(query_param("includeBuffer", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(log_body("TASK [deploy] ok")))
        .with_priority(2)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        Duration::from_millis(200),
        Duration::from_secs(5),
        Duration::from_secs(1),
    );
    let fetched = client.fetch_log(42, 7).await.unwrap();

    assert_eq!(fetched.snapshot.content, "TASK [deploy] ok");
    assert!(!fetched.snapshot.completed);
    assert_eq!(fetched.attempts, 2);
    assert!(fetched.elapsed >= Duration::from_millis(200));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_non_timeout_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOG_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_secs(1),
    );
    let err = client.fetch_log(42, 7).await.unwrap_err();
    assert!(matches!(err, TaskLinkError::ServerError { status_code: 502, .. }), "{:?}", err);
}

#[tokio::test]
async fn test_both_attempts_timing_out_reports_long_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(log_body("late")).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        Duration::from_millis(100),
        Duration::from_millis(300),
        Duration::from_secs(1),
    );
    let err = client.fetch_log(42, 7).await.unwrap_err();

    match &err {
        TaskLinkError::TimeoutError {
            operation,
            budget,
            attempts,
        } => {
            assert_eq!(operation, "fetch_log");
            assert_eq!(*budget, Duration::from_millis(300));
            assert_eq!(*attempts, 2);
        },
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.user_message().contains("still running"));
}

#[tokio::test]
async fn test_direct_fetch_sends_tail_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/direct", LOG_PATH)))
        .and(query_param("tail", "true"))
        .and(query_param("lines", "1000"))
        .and(query_param("nocache", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("PLAY RECAP\nhost1 : ok=3\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_secs(1),
    );
    let fetched = client.fetch_log_direct(42, 7).await.unwrap();

    assert_eq!(fetched.snapshot.content, "PLAY RECAP\nhost1 : ok=3\n");
    assert_eq!(fetched.snapshot.lines, Some(2));
    assert_eq!(fetched.attempts, 1);
}

#[tokio::test]
async fn test_direct_timeout_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/direct", LOG_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_string("x").set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_millis(100),
    );
    let err = client.fetch_log_direct(42, 7).await.unwrap_err();
    assert!(
        matches!(err, TaskLinkError::TimeoutError { ref operation, attempts: 1, .. } if operation == "fetch_log_direct"),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_envelope_error_code_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 404, "message": "work not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(
        &server.uri(),
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_secs(1),
    );
    let err = client.fetch_log(42, 7).await.unwrap_err();
    assert!(matches!(err, TaskLinkError::NotFound(ref m) if m == "work not found"));
}
