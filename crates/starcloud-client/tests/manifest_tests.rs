use std::time::Duration;

use serde_json::json;
use starcloud::{Archive, FileRecord, ManifestError};
use starcloud_client::{ClientConfig, PAGE_SIZE, RetryPolicy, StarCloudClient};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIST_PATH: &str = "/aiforearth/api/data/getFileListByPage";

fn client_for(server: &MockServer) -> StarCloudClient {
    StarCloudClient::new(ClientConfig {
        base_url: Some(server.uri()),
        retry: RetryPolicy {
            max_retries: 5,
            backoff_factor: Duration::ZERO,
        },
        ..ClientConfig::default()
    })
    .unwrap()
}

fn page_of(prefix: &str, count: usize) -> serde_json::Value {
    let entries: Vec<_> = (0..count)
        .map(|i| json!({ "file": format!("{prefix}_{i:03}.tif"), "size": 1000 + i }))
        .collect();
    json!({ "response": entries })
}

#[tokio::test]
async fn sends_dataset_path_and_table() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .and(body_partial_json(json!({
            "params": {
                "count": 100,
                "enableSpatialQuery": false,
                "page": 1,
                "path": "CSDC_samples/SDC_V003/31UFS/2020",
                "table": "rs_csdc30"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of("a", 2)))
        .expect(1)
        .mount(&server)
        .await;

    let records = client_for(&server).list_files("31UFS", 2020).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], FileRecord::new("a_000.tif", 1000));
}

#[tokio::test]
async fn follows_pages_until_a_short_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .and(body_partial_json(json!({ "params": { "page": 1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of("p1", PAGE_SIZE)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .and(body_partial_json(json!({ "params": { "page": 2 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of("p2", 3)))
        .expect(1)
        .mount(&server)
        .await;

    let records = client_for(&server).list_files("32UMD", 2018).await.unwrap();

    assert_eq!(records.len(), PAGE_SIZE + 3);
    assert_eq!(records[0].filename, "p1_000.tif");
    assert_eq!(records[PAGE_SIZE].filename, "p2_000.tif");
}

#[tokio::test]
async fn exact_multiple_of_page_size_ends_on_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .and(body_partial_json(json!({ "params": { "page": 1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of("p1", PAGE_SIZE)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .and(body_partial_json(json!({ "params": { "page": 2 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let records = client_for(&server).list_files("32UMD", 2018).await.unwrap();
    assert_eq!(records.len(), PAGE_SIZE);
}

#[tokio::test]
async fn server_ignoring_page_number_is_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of("p1", PAGE_SIZE)))
        .expect(2)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_files("32UMD", 2018)
        .await
        .unwrap_err();

    match err {
        ManifestError::Protocol { source, .. } => {
            assert!(source.to_string().contains("repeats the previous page"));
        }
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn accepts_string_sizes() {
    let server = MockServer::start().await;
    let fixture = include_str!("fixtures/file_list_strings.json");

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(fixture, "application/json"))
        .mount(&server)
        .await;

    let records = client_for(&server).list_files("31UFS", 2020).await.unwrap();

    assert_eq!(
        records,
        vec![
            FileRecord::new("CSDC30_31UFS_20200104.tif", 73_400_320),
            FileRecord::new("CSDC30_31UFS_20200111.tif", 73_400_320),
            FileRecord::new("CSDC30_31UFS_20200118.tif", 1024),
        ]
    );
}

#[tokio::test]
async fn unexpected_shape_is_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 500 })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_files("31UFS", 2020)
        .await
        .unwrap_err();
    assert!(matches!(err, ManifestError::Protocol { ref tile, year: 2020, .. } if tile.as_str() == "31UFS"));
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such table"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_files("31UFS", 2020)
        .await
        .unwrap_err();
    match err {
        ManifestError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such table");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of("a", 1)))
        .expect(1)
        .mount(&server)
        .await;

    let records = client_for(&server).list_files("31UFS", 2020).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn persistent_server_error_surfaces_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(6)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_files("31UFS", 2020)
        .await
        .unwrap_err();
    assert!(matches!(err, ManifestError::Status { status: 500, .. }));
}
