//! Scenario: HTTP session maps upstream responses onto fetch outcomes.
//!
//! GREEN when:
//! - a 200 JSON body is returned as-is, with the cookie jar replayed
//! - 401/403 are fatal (the session must be rebuilt)
//! - 5xx, timeouts and undecodable bodies are transient (skip the cycle)
//! - a rejected landing page fails session establishment

use std::time::Duration;

use httpmock::prelude::*;
use ow_session::{Cookie, Credentials, FetchError, HttpSessionFactory, SessionError, SessionFactory};
use serde_json::json;

fn creds() -> Credentials {
    Credentials::new(vec![Cookie {
        name: "sid".to_string(),
        value: "abc".to_string(),
        domain: None,
        path: None,
        secure: false,
        http_only: false,
        expires: None,
    }])
}

#[tokio::test]
async fn ok_body_is_returned_and_cookies_replayed() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/open-trades/").header("cookie", "sid=abc");
            then.status(200)
                .json_body(json!({"result": [{"order_id": 1, "symbol": "EURUSD"}]}));
        })
        .await;

    let factory = HttpSessionFactory::new(None, Duration::from_secs(5));
    let mut session = factory.establish(&creds()).await.unwrap();
    let body = session
        .fetch_snapshot(&server.url("/open-trades/"))
        .await
        .unwrap();

    assert_eq!(body["result"][0]["symbol"], "EURUSD");
    mock.assert_async().await;
    session.teardown().await;
}

#[tokio::test]
async fn auth_rejection_is_fatal() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/open-trades/");
            then.status(401);
        })
        .await;

    let factory = HttpSessionFactory::new(None, Duration::from_secs(5));
    let mut session = factory.establish(&creds()).await.unwrap();
    let err = session
        .fetch_snapshot(&server.url("/open-trades/"))
        .await
        .unwrap_err();
    assert!(err.is_fatal(), "{err}");
}

#[tokio::test]
async fn server_error_and_bad_body_are_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/down");
            then.status(502);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/garbage");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let factory = HttpSessionFactory::new(None, Duration::from_secs(5));
    let mut session = factory.establish(&creds()).await.unwrap();

    let down = session.fetch_snapshot(&server.url("/down")).await;
    assert!(matches!(down, Err(FetchError::Transient(_))), "{down:?}");

    let garbage = session.fetch_snapshot(&server.url("/garbage")).await;
    assert!(matches!(garbage, Err(FetchError::Transient(_))), "{garbage:?}");
}

#[tokio::test]
async fn request_timeout_is_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(json!({"result": []}));
        })
        .await;

    let factory = HttpSessionFactory::new(None, Duration::from_millis(100));
    let mut session = factory.establish(&creds()).await.unwrap();
    let slow = session.fetch_snapshot(&server.url("/slow")).await;
    assert!(matches!(slow, Err(FetchError::Transient(_))), "{slow:?}");
}

#[tokio::test]
async fn fetch_after_teardown_is_fatal() {
    let factory = HttpSessionFactory::new(None, Duration::from_secs(5));
    let mut session = factory.establish(&creds()).await.unwrap();
    session.teardown().await;
    let err = session
        .fetch_snapshot("http://127.0.0.1:9/never")
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn rejected_landing_page_fails_establish() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/webtrading/");
            then.status(403);
        })
        .await;

    let factory = HttpSessionFactory::new(Some(server.url("/webtrading/")), Duration::from_secs(5));
    match factory.establish(&creds()).await {
        Err(SessionError::Rejected(msg)) => assert!(msg.contains("403"), "{msg}"),
        Err(other) => panic!("expected Rejected, got {other}"),
        Ok(_) => panic!("expected Rejected, got a session"),
    }
}
