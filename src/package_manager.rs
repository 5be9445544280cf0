/// Package manager detection and cache directory resolution
///
/// Each supported package manager knows the command that prints its global
/// cache folder. The folder is whatever that command prints; depcache never
/// guesses a default location.
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

/// Descriptor of a supported package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageManagerInfo {
    pub name: &'static str,
    pub lock_file_patterns: &'static [&'static str],
    pub cache_folder_command: &'static [&'static str],
}

impl PackageManagerInfo {
    /// Command line as a single string, for messages
    pub fn command_line(&self) -> String {
        self.cache_folder_command.join(" ")
    }

    /// First lock file of this package manager present in `dir`
    pub fn find_lock_file(&self, dir: &Path) -> Option<PathBuf> {
        self.lock_file_patterns
            .iter()
            .map(|pattern| dir.join(pattern))
            .find(|path| path.is_file())
    }
}

pub const NPM: PackageManagerInfo = PackageManagerInfo {
    name: "npm",
    lock_file_patterns: &["package-lock.json", "npm-shrinkwrap.json", "yarn.lock"],
    cache_folder_command: &["npm", "config", "get", "cache"],
};

pub const PNPM: PackageManagerInfo = PackageManagerInfo {
    name: "pnpm",
    lock_file_patterns: &["pnpm-lock.yaml"],
    cache_folder_command: &["pnpm", "store", "path", "--silent"],
};

pub const YARN1: PackageManagerInfo = PackageManagerInfo {
    name: "yarn1",
    lock_file_patterns: &["yarn.lock"],
    cache_folder_command: &["yarn", "cache", "dir"],
};

pub const YARN2: PackageManagerInfo = PackageManagerInfo {
    name: "yarn2",
    lock_file_patterns: &["yarn.lock"],
    cache_folder_command: &["yarn", "config", "get", "cacheFolder"],
};

/// Names accepted for the `cache` input
pub const SUPPORTED: [&str; 3] = ["npm", "pnpm", "yarn"];

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Runs external tool commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands as child processes, resolving the program from PATH
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &[&str]) -> Result<CommandOutput> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Empty command"))?;

        let program_path = which::which(program).unwrap_or_else(|e| {
            debug!("Could not find '{}' in PATH: {}. Trying as-is.", program, e);
            PathBuf::from(program)
        });

        let output = tokio::process::Command::new(&program_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run '{}'", command.join(" ")))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Run `command` and return its trimmed stdout
///
/// A non-zero exit code is an error carrying the command's stderr, or a
/// generic message when stderr is blank.
pub async fn get_command_output(runner: &dyn CommandRunner, command: &[&str]) -> Result<String> {
    let output = runner.run(command).await?;

    if output.exit_code != 0 {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            anyhow::bail!(
                "The '{}' command failed with exit code: {}",
                command.join(" "),
                output.exit_code
            );
        }
        anyhow::bail!("{}", stderr);
    }

    Ok(output.stdout.trim().to_string())
}

/// Resolve the descriptor for `package_manager`
///
/// Returns `Ok(None)` for names outside [`SUPPORTED`]. For yarn the installed
/// version decides between the classic and berry descriptors.
pub async fn get_package_manager_info(
    runner: &dyn CommandRunner,
    package_manager: &str,
) -> Result<Option<PackageManagerInfo>> {
    match package_manager {
        "npm" => Ok(Some(NPM)),
        "pnpm" => Ok(Some(PNPM)),
        "yarn" => {
            let version = get_command_output(runner, &["yarn", "--version"]).await?;
            debug!("Consumed yarn version is {}", version);

            if version.starts_with("1.") {
                Ok(Some(YARN1))
            } else {
                Ok(Some(YARN2))
            }
        }
        _ => Ok(None),
    }
}

/// Resolve the cache folder of `info` by running its cache folder command
pub async fn get_cache_directory_path(
    runner: &dyn CommandRunner,
    info: &PackageManagerInfo,
    package_manager: &str,
) -> Result<PathBuf> {
    let stdout = get_command_output(runner, info.cache_folder_command).await?;
    if stdout.is_empty() {
        anyhow::bail!("Could not get cache folder path for {}", package_manager);
    }

    debug!("{} path is {}", package_manager, stdout);

    Ok(PathBuf::from(stdout))
}
