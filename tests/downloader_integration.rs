//! Integration tests for the downloader module.
//!
//! These tests run the HTTP and Unity Simulation downloaders end to end
//! against mock HTTP servers.

use std::path::Path;

use simdata_core::config::UsimConfig;
use simdata_core::downloader::{
    DatasetDownloader, DownloadError, DownloadOptions, HttpDownloader, UnitySimulationDownloader,
    UsimError,
    manifest::ManifestDownloader,
};
use simdata_core::fetch::{ChecksumError, HttpClient};
use simdata_core::schema::TableRegistry;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT_ID: &str = "e4f5b6a7-1111-2222-3333-444444444444";
const RUN_ID: &str = "run_42";

async fn mount_file(server: &MockServer, path_str: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

// ==================== HTTP downloader ====================

#[tokio::test]
async fn test_http_download_with_matching_checksum() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_file(&mock_server, "/dataset.zip", b"hello").await;
    // MD5("hello")
    mount_file(
        &mock_server,
        "/dataset.txt",
        b"5d41402abc4b2a76b9719d911017c592",
    )
    .await;

    let downloader = HttpDownloader::new();
    let options = DownloadOptions {
        checksum_file: Some(format!("{}/dataset.txt", mock_server.uri())),
        ..DownloadOptions::default()
    };
    let result = downloader
        .download(
            &format!("{}/dataset.zip", mock_server.uri()),
            output.path(),
            &options,
        )
        .await;

    assert!(result.is_ok(), "download should succeed: {:?}", result.err());
    assert_eq!(
        std::fs::read(output.path().join("dataset.zip")).unwrap(),
        b"hello"
    );
}

#[tokio::test]
async fn test_http_download_checksum_mismatch_deletes_file() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_file(&mock_server, "/dataset.zip", b"hello").await;
    mount_file(
        &mock_server,
        "/dataset.txt",
        b"00000000000000000000000000000000",
    )
    .await;

    let downloader = HttpDownloader::new();
    let options = DownloadOptions {
        checksum_file: Some(format!("{}/dataset.txt", mock_server.uri())),
        ..DownloadOptions::default()
    };
    let result = downloader
        .download(
            &format!("{}/dataset.zip", mock_server.uri()),
            output.path(),
            &options,
        )
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Checksum(ChecksumError::Mismatch { .. }))
    ));
    assert!(
        !output.path().join("dataset.zip").exists(),
        "corrupt artifact must not be left on disk"
    );
}

// ==================== Manifest batch downloads ====================

fn write_manifest(dir: &Path, rows: &[String]) -> std::path::PathBuf {
    let manifest_path = dir.join(format!("{RUN_ID}.csv"));
    std::fs::write(&manifest_path, rows.join("\n")).unwrap();
    manifest_path
}

#[tokio::test]
async fn test_batch_tolerates_partial_failures() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_file(&mock_server, "/files/captures_000.json", b"{}").await;
    mount_file(&mock_server, "/files/captures_001.json", b"{}").await;
    // captures_002 and captures_003 are not mounted; wiremock answers 404.

    let rows: Vec<String> = (0..4)
        .map(|i| {
            format!(
                "{RUN_ID},app-1,{i},0,captures_00{i}.json,{}/files/captures_00{i}.json",
                mock_server.uri()
            )
        })
        .collect();
    let manifest_path = write_manifest(output.path(), &rows);

    let registry = TableRegistry::new();
    let downloader = ManifestDownloader::new(
        &manifest_path,
        output.path(),
        HttpClient::new(),
        &registry,
    )
    .unwrap();

    let downloaded = downloader.download_captures().await;

    assert_eq!(downloaded.len(), 2, "only the served files succeed");
    assert!(output.path().join("captures_000.json").exists());
    assert!(output.path().join("captures_001.json").exists());
    assert!(!output.path().join("captures_002.json").exists());
}

#[tokio::test]
async fn test_batch_downloads_only_winning_attempt() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    // The superseded attempt's URI must never be hit.
    Mock::given(method("GET"))
        .and(path("/old/captures_000.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"stale".to_vec()))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_file(&mock_server, "/new/captures_000.json", b"fresh").await;

    let rows = vec![
        format!(
            "{RUN_ID},app-1,0,0,captures_000.json,{}/old/captures_000.json",
            mock_server.uri()
        ),
        format!(
            "{RUN_ID},app-1,0,1,captures_000.json,{}/new/captures_000.json",
            mock_server.uri()
        ),
    ];
    let manifest_path = write_manifest(output.path(), &rows);

    let registry = TableRegistry::new();
    let downloader = ManifestDownloader::new(
        &manifest_path,
        output.path(),
        HttpClient::new(),
        &registry,
    )
    .unwrap();

    let downloaded = downloader.download_all().await;

    assert_eq!(downloaded.len(), 1);
    assert_eq!(
        std::fs::read(output.path().join("captures_000.json")).unwrap(),
        b"fresh"
    );
}

// ==================== Unity Simulation downloader ====================

async fn mount_run_manifest(server: &MockServer, token: &str, manifest: String) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/v1/projects/{PROJECT_ID}/runs/{RUN_ID}/data"
        )))
        .and(header("authorization", format!("Bearer {token}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(manifest.into_bytes()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_usim_download_skips_binary_by_default() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    let manifest = [
        format!(
            "{RUN_ID},app-1,0,0,annotation_definitions.json,{}/f/annotation_definitions.json",
            mock_server.uri()
        ),
        format!(
            "{RUN_ID},app-1,1,0,metrics_000.json,{}/f/metrics_000.json",
            mock_server.uri()
        ),
        format!(
            "{RUN_ID},app-1,2,0,captures_000.json,{}/f/captures_000.json",
            mock_server.uri()
        ),
        format!(
            "{RUN_ID},app-1,3,0,RGB3/rgb_1.png,{}/f/rgb_1.png",
            mock_server.uri()
        ),
    ]
    .join("\n");
    mount_run_manifest(&mock_server, "secret-token", manifest).await;
    mount_file(&mock_server, "/f/annotation_definitions.json", b"{}").await;
    mount_file(&mock_server, "/f/metrics_000.json", b"{}").await;
    mount_file(&mock_server, "/f/captures_000.json", b"{}").await;

    // The binary file must not be requested without include_binary.
    Mock::given(method("GET"))
        .and(path("/f/rgb_1.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = UsimConfig::new(mock_server.uri());
    let downloader = UnitySimulationDownloader::new(config);
    let uri = format!("usim://secret-token@{PROJECT_ID}/{RUN_ID}");
    let result = downloader
        .download(&uri, output.path(), &DownloadOptions::default())
        .await;

    assert!(result.is_ok(), "download should succeed: {:?}", result.err());
    assert!(output.path().join(format!("{RUN_ID}.csv")).exists());
    assert!(output.path().join("annotation_definitions.json").exists());
    assert!(output.path().join("metrics_000.json").exists());
    assert!(output.path().join("captures_000.json").exists());
    assert!(!output.path().join("RGB3/rgb_1.png").exists());
}

#[tokio::test]
async fn test_usim_download_includes_binary_on_request() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    let manifest = format!(
        "{RUN_ID},app-1,0,0,RGB3/rgb_1.png,{}/f/rgb_1.png",
        mock_server.uri()
    );
    mount_run_manifest(&mock_server, "secret-token", manifest).await;
    mount_file(&mock_server, "/f/rgb_1.png", b"png-bytes").await;

    let config = UsimConfig::new(mock_server.uri());
    let downloader = UnitySimulationDownloader::new(config);
    let uri = format!("usim://secret-token@{PROJECT_ID}/{RUN_ID}");
    let options = DownloadOptions {
        include_binary: true,
        ..DownloadOptions::default()
    };
    let result = downloader.download(&uri, output.path(), &options).await;

    assert!(result.is_ok(), "download should succeed: {:?}", result.err());
    assert_eq!(
        std::fs::read(output.path().join("RGB3/rgb_1.png")).unwrap(),
        b"png-bytes"
    );
}

#[tokio::test]
async fn test_usim_reuses_cached_manifest() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    // A cached manifest means the run data service is never contacted.
    Mock::given(method("GET"))
        .and(path(format!(
            "/v1/projects/{PROJECT_ID}/runs/{RUN_ID}/data"
        )))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_file(&mock_server, "/f/egos.json", b"{}").await;

    std::fs::write(
        output.path().join(format!("{RUN_ID}.csv")),
        format!(
            "{RUN_ID},app-1,0,0,egos.json,{}/f/egos.json",
            mock_server.uri()
        ),
    )
    .unwrap();

    let config = UsimConfig::new(mock_server.uri());
    let downloader = UnitySimulationDownloader::new(config);
    let uri = format!("usim://secret-token@{PROJECT_ID}/{RUN_ID}");
    let result = downloader
        .download(&uri, output.path(), &DownloadOptions::default())
        .await;

    assert!(result.is_ok(), "download should succeed: {:?}", result.err());
    assert!(output.path().join("egos.json").exists());
}

#[tokio::test]
async fn test_usim_missing_credential_fails_before_any_request() {
    let output = TempDir::new().expect("failed to create temp dir");

    let config = UsimConfig::new("https://api.invalid.example.com");
    let downloader = UnitySimulationDownloader::new(config);
    let uri = format!("usim://{PROJECT_ID}/{RUN_ID}");
    let result = downloader
        .download(&uri, output.path(), &DownloadOptions::default())
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Usim(UsimError::MissingCredential { .. }))
    ));
}
