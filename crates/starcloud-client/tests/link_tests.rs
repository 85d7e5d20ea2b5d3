use serde_json::json;
use starcloud::test_support::test_session;
use starcloud::{Archive, AuthSession, LinkError, UserId};
use starcloud_client::{ClientConfig, StarCloudClient};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LINK_PATH: &str = "/starcloud/api/file/downloadResource";

fn client_for(server: &MockServer) -> StarCloudClient {
    StarCloudClient::new(ClientConfig {
        base_url: Some(server.uri()),
        ..ClientConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn sends_bearer_token_and_object_key() {
    let server = MockServer::start().await;
    let fixture = include_str!("fixtures/link_ok.json");
    let session = test_session();

    Mock::given(method("POST"))
        .and(path(LINK_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "country": "Germany",
            "objectKey": "shared-dataset/CSDC_samples/CSDC_samples/SDC_V003/31UFS/2020/CSDC30_31UFS_20200104.tif",
            "resourceId": 26,
            "resourceType": "REMOTE_SENSING",
            "userAccount": "tester",
            "userId": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(fixture, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let link = client_for(&server)
        .resolve_link("CSDC30_31UFS_20200104.tif", "31UFS", 2020, &session)
        .await
        .unwrap();

    assert_eq!(link.filename, "CSDC30_31UFS_20200104.tif");
    assert!(link.url.starts_with("https://obs.example.org/"));
    assert_eq!(link.size, 73_400_320);
}

#[tokio::test]
async fn string_user_id_is_echoed_as_string() {
    let server = MockServer::start().await;
    let session = AuthSession {
        user_id: UserId::Text("u-9".into()),
        ..test_session()
    };

    Mock::given(method("POST"))
        .and(path(LINK_PATH))
        .and(wiremock::matchers::body_partial_json(json!({ "userId": "u-9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fileName": "a.tif",
            "signedUrl": "https://obs.example.org/a.tif",
            "fileSize": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    let link = client_for(&server)
        .resolve_link("a.tif", "31UFS", 2020, &session)
        .await
        .unwrap();
    assert_eq!(link.size, 10);
}

#[tokio::test]
async fn unauthorized_means_session_expired() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LINK_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .resolve_link("a.tif", "31UFS", 2020, &test_session())
        .await
        .unwrap_err();

    assert!(err.is_session_expired());
}

#[tokio::test]
async fn other_failures_are_per_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LINK_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("object missing"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .resolve_link("a.tif", "31UFS", 2020, &test_session())
        .await
        .unwrap_err();

    assert!(!err.is_session_expired());
    match err {
        LinkError::Status {
            filename,
            status,
            body,
        } => {
            assert_eq!(filename, "a.tif");
            assert_eq!(status, 500);
            assert_eq!(body, "object missing");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_signed_url_is_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LINK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "fileName": "a.tif" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .resolve_link("a.tif", "31UFS", 2020, &test_session())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Protocol { .. }));
}
