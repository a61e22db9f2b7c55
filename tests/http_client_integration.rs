//! Integration tests for the HTTP search client against a mock search service.

mod support;

use std::path::Path;
use std::time::Duration;

use imageset_core::{
    DownloadClient, DownloadConfig, DownloadError, HttpSearchClient, ImageFormat, RetryPolicy,
};
use serde_json::json;
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

fn fast_client(server: &MockServer) -> HttpSearchClient {
    HttpSearchClient::new(&format!("{}/search", server.uri()))
        .unwrap()
        .with_retry_policy(RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(1),
            1.0,
        ))
}

fn config(max_images: u32) -> DownloadConfig {
    DownloadConfig {
        max_images,
        ..DownloadConfig::default()
    }
}

fn concept_dir(root: &TempDir) -> std::path::PathBuf {
    let dir = root.path().join("shot_type").join("closeup");
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn terms(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

async fn mount_search(server: &MockServer, term: &str, urls: &[String]) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", term))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": urls })))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer, image_path: &str, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JPEG_BYTES, content_type))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_writes_images_named_after_concept() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let urls = vec![
        format!("{}/img/a.jpg", server.uri()),
        format!("{}/img/b.jpg", server.uri()),
    ];
    mount_search(&server, "close up shot", &urls).await;
    mount_image(&server, "/img/a.jpg", "image/jpeg").await;
    mount_image(&server, "/img/b.jpg", "image/jpeg").await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["close up shot"]), &config(10), &dir)
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(file_names(&dir), vec!["closeup_1.jpg", "closeup_2.jpg"]);
    assert_eq!(std::fs::read(dir.join("closeup_1.jpg")).unwrap(), JPEG_BYTES);
}

#[tokio::test]
async fn test_fetch_skips_non_image_and_mismatched_format() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let urls = vec![
        format!("{}/page.html", server.uri()),
        format!("{}/img/a.png", server.uri()),
        format!("{}/img/b.jpg", server.uri()),
    ];
    mount_search(&server, "term", &urls).await;
    mount_image(&server, "/page.html", "text/html").await;
    mount_image(&server, "/img/a.png", "image/png").await;
    mount_image(&server, "/img/b.jpg", "image/jpeg").await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["term"]), &config(10), &dir)
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(file_names(&dir), vec!["closeup_1.jpg"]);
}

#[tokio::test]
async fn test_fetch_any_format_keeps_every_image_type() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let urls = vec![
        format!("{}/img/a.png", server.uri()),
        format!("{}/img/b.jpg", server.uri()),
    ];
    mount_search(&server, "term", &urls).await;
    mount_image(&server, "/img/a.png", "image/png").await;
    mount_image(&server, "/img/b.jpg", "image/jpeg").await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let any = DownloadConfig {
        image_format: ImageFormat::Any,
        ..config(10)
    };
    let count = fast_client(&server)
        .fetch(&terms(&["term"]), &any, &dir)
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(file_names(&dir), vec!["closeup_1.png", "closeup_2.jpg"]);
}

#[tokio::test]
async fn test_fetch_deduplicates_urls_across_terms() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let shared = format!("{}/img/shared.jpg", server.uri());
    let unique = format!("{}/img/unique.jpg", server.uri());
    mount_search(&server, "first", &[shared.clone()]).await;
    mount_search(&server, "second", &[shared, unique]).await;
    mount_image(&server, "/img/shared.jpg", "image/jpeg").await;
    mount_image(&server, "/img/unique.jpg", "image/jpeg").await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["first", "second"]), &config(10), &dir)
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(file_names(&dir).len(), 2);
}

#[tokio::test]
async fn test_fetch_respects_max_images_per_term() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let urls: Vec<String> = (0..5)
        .map(|i| format!("{}/img/{i}.jpg", server.uri()))
        .collect();
    mount_search(&server, "term", &urls).await;
    for i in 0..5 {
        mount_image(&server, &format!("/img/{i}.jpg"), "image/jpeg").await;
    }

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["term"]), &config(2), &dir)
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(file_names(&dir).len(), 2);
}

#[tokio::test]
async fn test_fetch_sends_search_parameters() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "wide shot"))
        .and(query_param("count", "7"))
        .and(query_param("format", "jpg"))
        .and(query_param("size", "medium"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["wide shot"]), &config(7), &dir)
        .await
        .unwrap();

    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_rate_limited_search_is_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let image = format!("{}/img/a.jpg", server.uri());
    mount_search(&server, "term", &[image]).await;
    mount_image(&server, "/img/a.jpg", "image/jpeg").await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["term"]), &config(10), &dir)
        .await
        .unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_quota_error_is_not_retried_and_stops_the_task() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(402))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let error = fast_client(&server)
        .fetch(&terms(&["first", "second"]), &config(10), &dir)
        .await
        .unwrap_err();

    assert!(matches!(error, DownloadError::Quota { .. }), "got {error:?}");
}

#[tokio::test]
async fn test_persistent_server_errors_fail_with_network_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let error = fast_client(&server)
        .fetch(&terms(&["term"]), &config(10), &dir)
        .await
        .unwrap_err();

    assert!(matches!(error, DownloadError::Network { .. }), "got {error:?}");
    assert!(file_names(&dir).is_empty());
}

#[tokio::test]
async fn test_one_failing_term_does_not_fail_the_task() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "broken"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    let image = format!("{}/img/a.jpg", server.uri());
    mount_search(&server, "working", &[image]).await;
    mount_image(&server, "/img/a.jpg", "image/jpeg").await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["broken", "working"]), &config(10), &dir)
        .await
        .unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_failed_image_download_is_skipped() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let urls = vec![
        format!("{}/img/missing.jpg", server.uri()),
        format!("{}/img/a.jpg", server.uri()),
    ];
    mount_search(&server, "term", &urls).await;
    Mock::given(method("GET"))
        .and(path("/img/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_image(&server, "/img/a.jpg", "image/jpeg").await;

    let root = TempDir::new().unwrap();
    let dir = concept_dir(&root);
    let count = fast_client(&server)
        .fetch(&terms(&["term"]), &config(10), &dir)
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(file_names(&dir), vec!["closeup_1.jpg"]);
}
