use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use starcloud::{AuthError, UserId};
use starcloud_client::{ClientConfig, Credentials, StarCloudClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const LOGIN_PATH: &str = "/starcloud/api/user/authenticate";

fn client_for(server: &MockServer) -> StarCloudClient {
    StarCloudClient::new(ClientConfig {
        base_url: Some(server.uri()),
        login_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    })
    .unwrap()
}

fn credentials() -> Credentials {
    Credentials::new("tester@example.org", "hunter2")
}

/// The body is `{"key": <base64 of one 2048-bit RSA block>}` and nothing else.
fn is_encrypted_key(request: &Request) -> bool {
    let Ok(body) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
        return false;
    };
    let Some(object) = body.as_object() else {
        return false;
    };
    let Some(key) = object.get("key").and_then(|k| k.as_str()) else {
        return false;
    };
    object.len() == 1 && STANDARD.decode(key).map(|b| b.len() == 256).unwrap_or(false)
}

#[tokio::test]
async fn posts_encrypted_key_and_returns_session() {
    let server = MockServer::start().await;
    let fixture = include_str!("fixtures/login_ok.json");

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(is_encrypted_key)
        .respond_with(ResponseTemplate::new(200).set_body_raw(fixture, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let session = client_for(&server).login(&credentials()).await.unwrap();

    assert_eq!(session.user_id, UserId::Numeric(4711));
    assert_eq!(session.user_name, "tester");
    assert_eq!(session.token, "eyJhbGciOiJIUzI1NiJ9.test.signature");
}

#[tokio::test]
async fn password_never_travels_in_clear() {
    let server = MockServer::start().await;
    let fixture = include_str!("fixtures/login_ok.json");

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(fixture, "application/json"))
        .mount(&server)
        .await;

    client_for(&server).login(&credentials()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(!body.contains("hunter2"));
    assert!(!body.contains("tester@example.org"));
}

#[tokio::test]
async fn rejected_credentials_fail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).login(&credentials()).await.unwrap_err();
    match err {
        AuthError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).login(&credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 503, .. }));
}

#[tokio::test]
async fn missing_token_is_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 401,
            "msg": "account locked",
            "data": null
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).login(&credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Protocol(_)));
}

#[tokio::test]
async fn slow_login_times_out() {
    let server = MockServer::start().await;
    let fixture = include_str!("fixtures/login_ok.json");

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(fixture, "application/json")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).login(&credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Network(_)));
}
