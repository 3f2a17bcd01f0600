//! Integration tests for the fetch module.
//!
//! These tests verify the full fetch flow with mock HTTP servers.

use simdata_core::fetch::{FetchError, HttpClient, RetryPolicy};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a mock server with a file endpoint.
async fn setup_mock_file(path_str: &str, content: &[u8]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_fetch_full_flow_preserves_content() {
    let content = b"{\"version\": \"0.0.1\", \"egos\": []}";
    let mock_server = setup_mock_file("/run/egos.json", content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let client = HttpClient::new();
    let url = format!("{}/run/egos.json", mock_server.uri());
    let result = client.fetch(&url, temp_dir.path(), None).await;

    assert!(result.is_ok(), "Fetch should succeed: {:?}", result.err());

    let file_path = result.unwrap();
    assert!(file_path.exists(), "Fetched file should exist");
    assert_eq!(
        file_path.file_name().unwrap().to_str().unwrap(),
        "egos.json"
    );

    let fetched = std::fs::read(&file_path).expect("should read file");
    assert_eq!(fetched, content, "Fetched content should match original");
}

#[tokio::test]
async fn test_fetch_explicit_filename_beats_content_disposition() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Content-Disposition",
                    r#"attachment; filename="server-name.json""#,
                )
                .set_body_bytes(b"{}"),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/api/download", mock_server.uri());

    let explicit = client
        .fetch(&url, temp_dir.path(), Some("caller-name.json"))
        .await
        .unwrap();
    assert_eq!(
        explicit.file_name().unwrap().to_str().unwrap(),
        "caller-name.json"
    );

    let derived = client.fetch(&url, temp_dir.path(), None).await.unwrap();
    assert_eq!(
        derived.file_name().unwrap().to_str().unwrap(),
        "server-name.json"
    );
}

#[tokio::test]
async fn test_fetch_404_is_permanent_failure() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    // expect(1): a permanent failure must not be retried
    Mock::given(method("GET"))
        .and(path("/not-found"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/not-found", mock_server.uri());
    let result = client.fetch(&url, temp_dir.path(), None).await;

    assert!(matches!(
        result,
        Err(FetchError::HttpStatus { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_fetch_retries_transient_failure_then_succeeds() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    // First attempt gets a 503, the retry gets the file.
    Mock::given(method("GET"))
        .and(path("/flaky.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"recovered".to_vec()))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/flaky.json", mock_server.uri());
    let result = client.fetch(&url, temp_dir.path(), None).await;

    assert!(result.is_ok(), "retry should recover: {:?}", result.err());
    let content = std::fs::read(result.unwrap()).unwrap();
    assert_eq!(content, b"recovered");
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/always-500"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    // Two attempts keeps the test fast; the default policy is five.
    let client = HttpClient::with_config(30, RetryPolicy::with_max_attempts(2));
    let url = format!("{}/always-500", mock_server.uri());
    let result = client.fetch(&url, temp_dir.path(), None).await;

    assert!(matches!(
        result,
        Err(FetchError::HttpStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_fetch_to_path_sends_bearer_token() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v1/projects/p/runs/r/data"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"csv-content".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/v1/projects/p/runs/r/data", mock_server.uri());
    let dest = temp_dir.path().join("nested/dir/r.csv");
    let result = client
        .fetch_to_path(&url, &dest, Some("secret-token"))
        .await;

    assert!(result.is_ok(), "fetch should succeed: {:?}", result.err());
    assert_eq!(std::fs::read(&dest).unwrap(), b"csv-content");
}
