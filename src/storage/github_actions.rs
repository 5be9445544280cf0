use super::{
    cache_version, create_archive, validate_key, validate_paths, CacheError, CacheStore,
    CACHE_NOT_SAVED, COMPRESSION_METHOD,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const ACCEPT_HEADER: &str = "application/json;api-version=6.0-preview.1";

/// Tunables for archiving and uploading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Bytes sent per PATCH request
    pub chunk_size: u64,
    /// Chunk uploads in flight at once
    pub concurrency: usize,
    /// Largest archive the service will accept
    pub size_limit: u64,
    pub compression_level: i32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 32 * 1024 * 1024,
            concurrency: 4,
            size_limit: 10 * 1024 * 1024 * 1024,
            compression_level: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Cache service location and credentials
#[derive(Debug, Clone)]
struct Endpoint {
    cache_url: String,
    token: String,
}

/// GitHub Actions cache service client
///
/// Saving an entry is a three step exchange: reserve the key, upload the
/// archive in ranged chunks, then commit the total size.
/// Credentials come from ACTIONS_CACHE_URL and ACTIONS_RUNTIME_TOKEN, which
/// the runner provides to every action step.
pub struct GithubActionsCache {
    client: Client,
    endpoint: Option<Endpoint>,
    options: UploadOptions,
}

#[derive(Serialize, Deserialize)]
struct ReserveCacheRequest {
    key: String,
    version: String,
    #[serde(rename = "cacheSize")]
    cache_size: u64,
}

#[derive(Serialize, Deserialize)]
struct ReserveCacheResponse {
    #[serde(rename = "cacheId")]
    cache_id: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct CommitCacheRequest {
    size: u64,
}

impl GithubActionsCache {
    /// Create a client for the given cache service
    pub fn new(cache_url: String, token: String, options: UploadOptions) -> Result<Self> {
        Self::build(
            Some(Endpoint {
                cache_url: cache_url.trim_end_matches('/').to_string(),
                token,
            }),
            options,
        )
    }

    /// Create a client from the runner environment
    ///
    /// Missing variables are not an error here; every save then fails with a
    /// warning, the same way an unreachable service does.
    pub fn from_env(options: UploadOptions) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), options)
    }

    /// Same as [`GithubActionsCache::from_env`] with an explicit environment lookup
    pub fn from_lookup<F>(env_lookup: F, options: UploadOptions) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match (
            env_lookup("ACTIONS_CACHE_URL"),
            env_lookup("ACTIONS_RUNTIME_TOKEN"),
        ) {
            (Some(cache_url), Some(token)) if !cache_url.is_empty() => {
                Self::new(cache_url, token, options)
            }
            _ => Self::build(None, options),
        }
    }

    fn build(endpoint: Option<Endpoint>, options: UploadOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            options,
        })
    }

    fn resource_url(endpoint: &Endpoint, resource: &str) -> String {
        format!("{}/_apis/artifactcache/{}", endpoint.cache_url, resource)
    }

    async fn try_save(&self, paths: &[PathBuf], key: &str) -> Result<i64, CacheError> {
        validate_key(key)?;
        validate_paths(paths)?;

        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| anyhow!("Cache Service Url not found, unable to save cache."))?;

        let version = cache_version(paths, COMPRESSION_METHOD);

        let temp_dir = tempfile::TempDir::new().context("Failed to create temporary directory")?;
        let archive_path = temp_dir.path().join("cache.tzst");

        let summary = {
            let paths = paths.to_vec();
            let archive_path = archive_path.clone();
            let level = self.options.compression_level;
            tokio::task::spawn_blocking(move || create_archive(&paths, &archive_path, level))
                .await
                .context("Archive task failed")??
        };

        info!(
            operation = "archive",
            file_count = summary.file_count,
            size_bytes = summary.size_bytes,
            "Cache Size: ~{} MB ({} B)",
            summary.size_bytes / (1024 * 1024),
            summary.size_bytes
        );

        if summary.size_bytes > self.options.size_limit {
            return Err(anyhow!(
                "Cache size of ~{} MB ({} B) is over the {} MB limit, not saving cache.",
                summary.size_bytes / (1024 * 1024),
                summary.size_bytes,
                self.options.size_limit / (1024 * 1024)
            )
            .into());
        }

        let cache_id = self
            .reserve_cache(endpoint, key, &version, summary.size_bytes)
            .await?;
        debug!(operation = "reserve", cache_id, "Reserved cache ID: {}", cache_id);

        self.upload_archive(endpoint, cache_id, &archive_path, summary.size_bytes)
            .await?;

        self.commit_cache(endpoint, cache_id, summary.size_bytes)
            .await?;

        info!(operation = "commit", key = %key, cache_id, "Cache saved successfully");

        Ok(cache_id)
    }

    async fn reserve_cache(
        &self,
        endpoint: &Endpoint,
        key: &str,
        version: &str,
        cache_size: u64,
    ) -> Result<i64, CacheError> {
        let url = Self::resource_url(endpoint, "caches");
        debug!("POST {} (reserving cache for key: {})", url, key);

        let request = ReserveCacheRequest {
            key: key.to_string(),
            version: version.to_string(),
            cache_size,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.token)
            .header(ACCEPT, ACCEPT_HEADER)
            .json(&request)
            .send()
            .await
            .context("Failed to reserve cache")?;

        let status = response.status();
        let (cache_id, details) = if status.is_success() {
            let body: ReserveCacheResponse = response
                .json()
                .await
                .context("Failed to parse reserve response")?;
            (body.cache_id, status.to_string())
        } else {
            let body = response.text().await.unwrap_or_default();
            (None, format!("{} - {}", status, body))
        };

        match cache_id {
            Some(cache_id) => Ok(cache_id),
            None if status == StatusCode::BAD_REQUEST => Err(anyhow!(
                "Cache size of ~{} MB ({} B) is over the data cap limit, not saving cache.",
                cache_size / (1024 * 1024),
                cache_size
            )
            .into()),
            None => Err(CacheError::ReserveCache(format!(
                "Unable to reserve cache with key {}, another job may be creating this cache. More details: {}",
                key, details
            ))),
        }
    }

    async fn upload_archive(
        &self,
        endpoint: &Endpoint,
        cache_id: i64,
        archive_path: &Path,
        archive_size: u64,
    ) -> Result<(), CacheError> {
        let url = Self::resource_url(endpoint, &format!("caches/{}", cache_id));
        let chunk_size = self.options.chunk_size.max(1);
        let concurrency = self.options.concurrency.max(1);

        debug!(
            operation = "upload",
            size_bytes = archive_size,
            "PATCH {} ({} bytes in chunks of {})",
            url,
            archive_size,
            chunk_size
        );

        let mut uploads = JoinSet::new();
        let mut start = 0;

        while start < archive_size {
            let end = (start + chunk_size).min(archive_size) - 1;

            while uploads.len() >= concurrency {
                join_upload(&mut uploads).await?;
            }

            uploads.spawn(upload_chunk(
                self.client.clone(),
                url.clone(),
                endpoint.token.clone(),
                archive_path.to_path_buf(),
                start,
                end,
            ));

            start = end + 1;
        }

        while !uploads.is_empty() {
            join_upload(&mut uploads).await?;
        }

        Ok(())
    }

    async fn commit_cache(
        &self,
        endpoint: &Endpoint,
        cache_id: i64,
        size: u64,
    ) -> Result<(), CacheError> {
        let url = Self::resource_url(endpoint, &format!("caches/{}", cache_id));
        debug!("POST {} (committing cache)", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.token)
            .header(ACCEPT, ACCEPT_HEADER)
            .json(&CommitCacheRequest { size })
            .send()
            .await
            .context("Failed to commit cache")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Cache service responded with {} during commit cache.",
                response.status()
            )
            .into());
        }

        Ok(())
    }
}

/// Wait for one chunk upload to finish
async fn join_upload(uploads: &mut JoinSet<Result<()>>) -> Result<(), CacheError> {
    match uploads.join_next().await {
        Some(Ok(result)) => result.map_err(CacheError::from),
        Some(Err(e)) if e.is_panic() => Err(anyhow!("Upload task panicked").into()),
        Some(Err(e)) => Err(anyhow!("Upload task failed: {}", e).into()),
        None => Ok(()),
    }
}

/// Upload bytes `start..=end` of the archive
async fn upload_chunk(
    client: Client,
    url: String,
    token: String,
    archive_path: PathBuf,
    start: u64,
    end: u64,
) -> Result<()> {
    let mut file = tokio::fs::File::open(&archive_path)
        .await
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    file.seek(SeekFrom::Start(start))
        .await
        .context("Failed to seek archive")?;

    let mut chunk = vec![0u8; (end - start + 1) as usize];
    file.read_exact(&mut chunk)
        .await
        .context("Failed to read archive chunk")?;

    let response = client
        .patch(&url)
        .bearer_auth(&token)
        .header(ACCEPT, ACCEPT_HEADER)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_RANGE, format!("bytes {}-{}/*", start, end))
        .body(Bytes::from(chunk))
        .send()
        .await
        .context("Failed to upload cache")?;

    if !response.status().is_success() {
        anyhow::bail!(
            "Cache service responded with {} during upload chunk.",
            response.status()
        );
    }

    Ok(())
}

#[async_trait]
impl CacheStore for GithubActionsCache {
    async fn save_cache(&self, paths: &[PathBuf], key: &str) -> Result<i64> {
        match self.try_save(paths, key).await {
            Ok(cache_id) => Ok(cache_id),
            Err(e @ CacheError::Validation(_)) => Err(e.into()),
            Err(CacheError::ReserveCache(message)) => {
                info!("Failed to save: {}", message);
                Ok(CACHE_NOT_SAVED)
            }
            Err(CacheError::Service(e)) => {
                warn!("Failed to save: {:#}", e);
                Ok(CACHE_NOT_SAVED)
            }
        }
    }
}
