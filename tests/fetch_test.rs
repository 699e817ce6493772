//! Integration tests for the retrying fetch client.

use std::time::Duration;

use assert_matches::assert_matches;
use mediaforge::fetch::{FetchClient, FetchOptions, RetryPolicy, DEFAULT_USER_AGENT};
use mediaforge_common::{Error, FailureKind};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> FetchClient {
    FetchClient::new(
        RetryPolicy::new(2, Duration::from_millis(5)),
        Duration::from_secs(5),
        DEFAULT_USER_AGENT,
    )
}

#[tokio::test]
async fn service_unavailable_is_attempted_three_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client()
        .get_json::<Value>(&format!("{}/busy", server.uri()), &FetchOptions::new())
        .await
        .unwrap_err();

    assert_matches!(err, Error::Upstream { status: 503, ref body } if body == "maintenance");
    assert_eq!(err.failure_kind(), FailureKind::Busy);
}

#[tokio::test]
async fn rate_limit_then_success_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let value: Value = assert_ok!(
        client()
            .get_json(&format!("{}/flaky", server.uri()), &FetchOptions::new())
            .await
    );
    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn not_found_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let err = assert_err!(client().get_json::<Value>(&url, &FetchOptions::new()).await);
    assert_matches!(err, Error::Upstream { status: 404, .. });
}

#[tokio::test]
async fn optional_fetch_maps_not_found_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maybe"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let found: Option<Value> = client()
        .get_optional_json(&format!("{}/maybe", server.uri()), &FetchOptions::new())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn malformed_body_is_a_validation_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client()
        .get_json::<Value>(&format!("{}/garbage", server.uri()), &FetchOptions::new())
        .await
        .unwrap_err();
    assert_matches!(err, Error::Validation(_));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = client()
        .get_json::<Value>(&format!("http://127.0.0.1:{port}/"), &FetchOptions::new())
        .await
        .unwrap_err();
    assert_matches!(err, Error::Network(_));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn query_and_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/echo"))
        .and(query_param("q", "a b"))
        .and(header("X-Token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let opts = FetchOptions::new().query("q", "a b").header("X-Token", "secret");
    let value: Value = client()
        .get_json(&format!("{}/echo", server.uri()), &opts)
        .await
        .unwrap();
    assert_eq!(value, json!([]));
}

#[tokio::test]
async fn post_sends_plain_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/games"))
        .and(body_string("fields name; limit 1;"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let value: Value = client()
        .post_json(
            &format!("{}/games", server.uri()),
            "fields name; limit 1;",
            &FetchOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(value[0]["id"], 1);
}
