//! End-to-end CLI tests for the imageset binary.

#![allow(deprecated)]

mod support;

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

/// Command with an isolated config home so a developer's config file never leaks in.
fn imageset(temp: &TempDir) -> Command {
    let config_home = temp.path().join("xdg-config");
    std::fs::create_dir_all(&config_home).unwrap();
    let mut cmd = Command::cargo_bin("imageset").unwrap();
    cmd.env("XDG_CONFIG_HOME", &config_home)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn write_taxonomy(temp: &TempDir, body: &str) -> std::path::PathBuf {
    let path = temp.path().join("taxonomy.json");
    std::fs::write(&path, body).unwrap();
    path
}

fn small_taxonomy(temp: &TempDir) -> std::path::PathBuf {
    write_taxonomy(
        temp,
        r#"{
            "C": [
                {"c1": ["red car"]},
                {"c2": ["blue car"]}
            ],
            "D": [
                {"d1": ["green car"]}
            ]
        }"#,
    )
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, |entries| entries.count())
}

#[test]
fn test_binary_help_displays_usage() {
    let temp = TempDir::new().unwrap();
    imageset(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--resume"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let temp = TempDir::new().unwrap();
    imageset(&temp)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_dry_run_with_bundled_taxonomy_prints_task_count() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("out");
    imageset(&temp)
        .arg("--dry-run")
        .arg("--root")
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("214 tasks"));
    assert!(!root.exists(), "dry run must not create the output root");
}

#[test]
fn test_dry_run_with_custom_taxonomy() {
    let temp = TempDir::new().unwrap();
    let taxonomy = small_taxonomy(&temp);
    imageset(&temp)
        .arg("--dry-run")
        .arg("-v")
        .arg("--taxonomy")
        .arg(&taxonomy)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 tasks"))
        .stdout(predicate::str::contains("C/c2: blue car"));
}

#[test]
fn test_invalid_taxonomy_exits_with_two() {
    let temp = TempDir::new().unwrap();
    let taxonomy = write_taxonomy(&temp, r#"{"C": [{"c1": []}]}"#);
    let assert = imageset(&temp)
        .arg("--dry-run")
        .arg("--taxonomy")
        .arg(&taxonomy)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
    assert_eq!(assert.get_output().status.code(), Some(2));
}

#[test]
fn test_missing_taxonomy_file_exits_with_two() {
    let temp = TempDir::new().unwrap();
    let assert = imageset(&temp)
        .arg("--dry-run")
        .arg("--taxonomy")
        .arg(temp.path().join("missing.json"))
        .assert()
        .failure();
    assert_eq!(assert.get_output().status.code(), Some(2));
}

#[test]
fn test_run_without_search_endpoint_exits_with_two() {
    let temp = TempDir::new().unwrap();
    let taxonomy = small_taxonomy(&temp);
    let assert = imageset(&temp)
        .arg("--taxonomy")
        .arg(&taxonomy)
        .arg("--root")
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("search endpoint"));
    assert_eq!(assert.get_output().status.code(), Some(2));
}

#[test]
fn test_invalid_config_file_exits_with_two() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("bad.toml");
    std::fs::write(&config, "concurrency = 500\n").unwrap();
    let assert = imageset(&temp)
        .arg("--dry-run")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure();
    assert_eq!(assert.get_output().status.code(), Some(2));
}

#[tokio::test]
async fn test_full_run_downloads_into_concept_directories() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [format!("{}/img/a.jpg", server.uri())]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"JPEG".to_vec(), "image/jpeg"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let taxonomy = small_taxonomy(&temp);
    let root = temp.path().join("out");
    let summary_path = temp.path().join("summary.json");

    imageset(&temp)
        .arg("--taxonomy")
        .arg(&taxonomy)
        .arg("--root")
        .arg(&root)
        .arg("--search-endpoint")
        .arg(format!("{}/search", server.uri()))
        .arg("--summary-json")
        .arg(&summary_path)
        .arg("-c")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 succeeded"));

    assert!(root.join("C").join("c1").join("c1_1.jpg").is_file());
    assert!(root.join("C").join("c2").join("c2_1.jpg").is_file());
    assert!(root.join("D").join("d1").join("d1_1.jpg").is_file());

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["succeeded"], 3);
    assert_eq!(summary["downloaded"], 3);
}

#[tokio::test]
async fn test_failed_concept_exits_with_one_and_resume_retries_it() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "blue car"))
        .respond_with(ResponseTemplate::new(402))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            format!("{}/img/a.jpg", server.uri())
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"JPEG".to_vec(), "image/jpeg"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let taxonomy = small_taxonomy(&temp);
    let root = temp.path().join("out");
    let endpoint = format!("{}/search", server.uri());

    let first = imageset(&temp)
        .arg("--taxonomy")
        .arg(&taxonomy)
        .arg("--root")
        .arg(&root)
        .arg("--search-endpoint")
        .arg(&endpoint)
        .assert()
        .failure()
        .stdout(predicate::str::contains("C/c2 [quota]"));
    assert_eq!(first.get_output().status.code(), Some(1));
    assert_eq!(count_files(&root.join("C").join("c2")), 0);

    imageset(&temp)
        .arg("--taxonomy")
        .arg(&taxonomy)
        .arg("--root")
        .arg(&root)
        .arg("--search-endpoint")
        .arg(&endpoint)
        .arg("--resume")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 succeeded"))
        .stdout(predicate::str::contains("2 skipped"));
    assert_eq!(count_files(&root.join("C").join("c1")), 1);
    assert_eq!(count_files(&root.join("C").join("c2")), 1);
}
