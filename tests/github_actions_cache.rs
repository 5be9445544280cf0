//! Integration tests for the GitHub Actions cache client.
//!
//! Uses wiremock for the cache service. Covers the reserve/upload/commit
//! exchange, chunking, and the failures that are downgraded to "not saved".

use std::fs;
use std::path::PathBuf;

use depcache::storage::github_actions::UploadOptions;
use depcache::{CacheStore, GithubActionsCache, CACHE_NOT_SAVED};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache_dir_with_files(temp: &TempDir) -> PathBuf {
    let dir = temp.path().join(".npm");
    fs::create_dir_all(dir.join("_cacache")).unwrap();
    fs::write(dir.join("_cacache/a"), "first entry").unwrap();
    fs::write(dir.join("_cacache/b"), "second entry").unwrap();
    dir
}

fn client(mock_server: &MockServer, options: UploadOptions) -> GithubActionsCache {
    // The runner hands out the URL with a trailing slash
    GithubActionsCache::new(
        format!("{}/", mock_server.uri()),
        "test-token".to_string(),
        options,
    )
    .expect("failed to create client")
}

async fn mount_reserve(mock_server: &MockServer, cache_id: i64) {
    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({ "key": "node-cache-K2" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "cacheId": cache_id })))
        .expect(1)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_save_reserves_uploads_and_commits() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let cache_dir = cache_dir_with_files(&temp);

    mount_reserve(&mock_server, 42).await;

    Mock::given(method("PATCH"))
        .and(path("/_apis/artifactcache/caches/42"))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches/42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = client(&mock_server, UploadOptions::default());
    let cache_id = cache
        .save_cache(&[cache_dir], "node-cache-K2")
        .await
        .expect("save failed");

    assert_eq!(cache_id, 42);
}

#[tokio::test]
async fn test_upload_is_split_into_ranged_chunks() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let cache_dir = cache_dir_with_files(&temp);

    mount_reserve(&mock_server, 7).await;

    Mock::given(method("PATCH"))
        .and(path("/_apis/artifactcache/caches/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let options = UploadOptions {
        chunk_size: 16,
        concurrency: 2,
        ..UploadOptions::default()
    };
    let cache = client(&mock_server, options);
    assert_eq!(
        cache.save_cache(&[cache_dir], "node-cache-K2").await.unwrap(),
        7
    );

    let requests = mock_server.received_requests().await.unwrap();
    let mut ranges: Vec<(u64, u64)> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .map(|r| {
            let range = r.headers.get("content-range").unwrap().to_str().unwrap();
            let bounds = range
                .strip_prefix("bytes ")
                .and_then(|s| s.strip_suffix("/*"))
                .unwrap();
            let (start, end) = bounds.split_once('-').unwrap();
            (start.parse().unwrap(), end.parse().unwrap())
        })
        .collect();
    ranges.sort();

    assert!(ranges.len() > 1, "expected several chunks, got {:?}", ranges);
    assert_eq!(ranges[0].0, 0);
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].1 + 1, pair[1].0, "chunks must be contiguous");
        assert_eq!(pair[0].1 - pair[0].0 + 1, 16);
    }

    let total: u64 = ranges.last().unwrap().1 + 1;
    let commit = requests
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path().ends_with("/caches/7"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&commit.body).unwrap();
    assert_eq!(body["size"], json!(total));
}

#[tokio::test]
async fn test_reserve_conflict_is_not_saved() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let cache_dir = cache_dir_with_files(&temp);

    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches"))
        .respond_with(
            ResponseTemplate::new(409).set_body_string("Cache already exists"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let cache = client(&mock_server, UploadOptions::default());
    let cache_id = cache.save_cache(&[cache_dir], "node-cache-K2").await.unwrap();

    assert_eq!(cache_id, CACHE_NOT_SAVED);
}

#[tokio::test]
async fn test_upload_failure_is_not_saved() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let cache_dir = cache_dir_with_files(&temp);

    mount_reserve(&mock_server, 9).await;

    Mock::given(method("PATCH"))
        .and(path("/_apis/artifactcache/caches/9"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let cache = client(&mock_server, UploadOptions::default());
    let cache_id = cache.save_cache(&[cache_dir], "node-cache-K2").await.unwrap();

    assert_eq!(cache_id, CACHE_NOT_SAVED);
}

#[tokio::test]
async fn test_commit_failure_is_not_saved() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let cache_dir = cache_dir_with_files(&temp);

    mount_reserve(&mock_server, 11).await;

    Mock::given(method("PATCH"))
        .and(path("/_apis/artifactcache/caches/11"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches/11"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let cache = client(&mock_server, UploadOptions::default());
    let cache_id = cache.save_cache(&[cache_dir], "node-cache-K2").await.unwrap();

    assert_eq!(cache_id, CACHE_NOT_SAVED);
}

#[tokio::test]
async fn test_oversized_archive_is_not_uploaded() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let cache_dir = cache_dir_with_files(&temp);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "cacheId": 1 })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let options = UploadOptions {
        size_limit: 1,
        ..UploadOptions::default()
    };
    let cache = client(&mock_server, options);
    let cache_id = cache.save_cache(&[cache_dir], "node-cache-K2").await.unwrap();

    assert_eq!(cache_id, CACHE_NOT_SAVED);
}

#[tokio::test]
async fn test_missing_path_is_an_error() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    let cache = client(&mock_server, UploadOptions::default());
    let err = cache
        .save_cache(&[temp.path().join("gone")], "node-cache-K2")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Path Validation Error"));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
