pub mod archive;
pub mod github_actions;

pub use archive::{create_archive, ArchiveSummary};
pub use github_actions::GithubActionsCache;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;

/// Returned by [`CacheStore::save_cache`] when nothing was saved
///
/// Covers both "the service refused the reservation" (usually another job
/// saving the same key) and "the save failed and was downgraded to a
/// warning". Callers cannot tell the two apart.
pub const CACHE_NOT_SAVED: i64 = -1;

/// Longest key the cache service accepts
pub const MAX_KEY_LENGTH: usize = 512;

/// Compression tag mixed into the cache version
pub const COMPRESSION_METHOD: &str = "zstd";

/// Bumped whenever the archive layout changes
const VERSION_SALT: &str = "1.0";

/// Remote cache backend
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Archive `paths` and store them under `key`
    ///
    /// Returns the cache id assigned by the backend, or [`CACHE_NOT_SAVED`].
    /// Only invalid arguments are reported as `Err`; backend failures are
    /// logged and turned into [`CACHE_NOT_SAVED`].
    async fn save_cache(&self, paths: &[PathBuf], key: &str) -> Result<i64>;
}

/// Errors raised while saving a cache entry
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid key or paths; never downgraded to a warning
    #[error("{0}")]
    Validation(String),

    /// The service refused to reserve the key
    #[error("{0}")]
    ReserveCache(String),

    /// Any other service, transport or archive failure
    #[error(transparent)]
    Service(#[from] anyhow::Error),
}

/// Check that `key` is accepted by the cache service
pub fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::Validation(format!(
            "Key Validation Error: {} cannot be larger than {} characters.",
            key, MAX_KEY_LENGTH
        )));
    }

    if key.contains(',') {
        return Err(CacheError::Validation(format!(
            "Key Validation Error: {} cannot contain commas.",
            key
        )));
    }

    Ok(())
}

/// Check that there is at least one path and every path exists
pub fn validate_paths(paths: &[PathBuf]) -> Result<(), CacheError> {
    if paths.is_empty() {
        return Err(CacheError::Validation(
            "Path Validation Error: At least one directory or file path is required".to_string(),
        ));
    }

    if let Some(missing) = paths.iter().find(|path| !path.exists()) {
        return Err(CacheError::Validation(format!(
            "Path Validation Error: Path(s) specified in the action for caching do(es) not exist, hence no cache is being saved: {}",
            missing.display()
        )));
    }

    Ok(())
}

/// Version string the service uses to scope entries to a path set
///
/// Entries saved with a different path list or compression method never
/// match on restore.
pub fn cache_version(paths: &[PathBuf], compression: &str) -> String {
    let mut components: Vec<String> = paths
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    components.push(compression.to_string());
    components.push(VERSION_SALT.to_string());

    let mut hasher = Sha256::new();
    hasher.update(components.join("|").as_bytes());
    hex::encode(hasher.finalize())
}
