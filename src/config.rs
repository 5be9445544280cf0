use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::github_actions::UploadOptions;

/// Name of the project-level config file
pub const CONFIG_FILE_NAME: &str = "depcache.toml";

/// Complete depcache configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DepcacheConfig {
    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Cache service upload configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    /// Bytes per upload request (e.g., "32MB")
    #[serde(default = "default_chunk_size")]
    pub chunk_size: String,

    /// Chunk uploads in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout (e.g., "60s", "5m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            concurrency: default_concurrency(),
            timeout: default_timeout(),
        }
    }
}

/// Archive configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveConfig {
    /// zstd compression level (1-22)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// Largest archive the cache service accepts (e.g., "10GB")
    #[serde(default = "default_size_limit")]
    pub size_limit: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            size_limit: default_size_limit(),
        }
    }
}

fn default_chunk_size() -> String {
    "32MB".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout() -> String {
    "60s".to_string()
}

fn default_compression_level() -> i32 {
    3
}

fn default_size_limit() -> String {
    "10GB".to_string()
}

impl DepcacheConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DepcacheConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with auto-discovery support
    ///
    /// An explicit path wins. Otherwise `depcache.toml` is searched for from
    /// the current directory upwards, then `~/.config/depcache/config.toml`.
    /// Falls back to defaults when nothing is found.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let current_dir = std::env::current_dir()
            .context("Failed to get current directory for config discovery")?;

        match discover_config(&current_dir) {
            Some(path) => {
                tracing::debug!("Using config: {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if parse_size(&self.upload.chunk_size)? == 0 {
            anyhow::bail!("upload.chunk_size must be greater than zero");
        }

        if self.upload.concurrency == 0 {
            anyhow::bail!("upload.concurrency must be at least 1");
        }

        parse_duration(&self.upload.timeout)?;
        parse_size(&self.archive.size_limit)?;

        if !(1..=22).contains(&self.archive.compression_level) {
            anyhow::bail!("archive.compression_level must be between 1 and 22");
        }

        Ok(())
    }

    /// Upload tunables for the cache client
    pub fn upload_options(&self) -> Result<UploadOptions> {
        Ok(UploadOptions {
            chunk_size: parse_size(&self.upload.chunk_size)?,
            concurrency: self.upload.concurrency,
            size_limit: parse_size(&self.archive.size_limit)?,
            compression_level: self.archive.compression_level,
            timeout: parse_duration(&self.upload.timeout)?,
        })
    }
}

/// Find a config file by traversing up from `start_dir`
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = Some(start_dir);

    while let Some(dir) = current {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    // Fallback to global config
    let global_config = dirs::home_dir()?.join(".config/depcache/config.toml");
    global_config.is_file().then_some(global_config)
}

/// Parse a size string (e.g., "10GB", "32MB", "512KB") into bytes
pub fn parse_size(size_str: &str) -> Result<u64> {
    let size_str = size_str.trim().to_uppercase();

    if let Some(num) = size_str.strip_suffix("TB") {
        scale(num, 1024 * 1024 * 1024 * 1024, "Invalid size number", "Size too large")
    } else if let Some(num) = size_str.strip_suffix("GB") {
        scale(num, 1024 * 1024 * 1024, "Invalid size number", "Size too large")
    } else if let Some(num) = size_str.strip_suffix("MB") {
        scale(num, 1024 * 1024, "Invalid size number", "Size too large")
    } else if let Some(num) = size_str.strip_suffix("KB") {
        scale(num, 1024, "Invalid size number", "Size too large")
    } else {
        // Assume bytes
        size_str.parse().context("Invalid size format")
    }
}

/// Parse a duration string (e.g., "60s", "5m", "1h")
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    let secs = if let Some(num) = duration_str.strip_suffix('h') {
        scale(num, 60 * 60, "Invalid duration number", "Duration too large")?
    } else if let Some(num) = duration_str.strip_suffix('m') {
        scale(num, 60, "Invalid duration number", "Duration too large")?
    } else if let Some(num) = duration_str.strip_suffix('s') {
        scale(num, 1, "Invalid duration number", "Duration too large")?
    } else {
        // Assume seconds
        duration_str.parse().context("Invalid duration format")?
    };

    Ok(Duration::from_secs(secs))
}

fn scale(num: &str, unit: u64, invalid: &'static str, overflow: &'static str) -> Result<u64> {
    let num: u64 = num.trim().parse().context(invalid)?;
    num.checked_mul(unit).context(overflow)
}
