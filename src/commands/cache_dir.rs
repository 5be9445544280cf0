/// `depcache cache-dir` command implementation
///
/// Prints the cache folder the save step would upload, plus the lock file
/// found in the current directory. Useful when debugging a workflow locally.
use anyhow::{Context, Result};

use depcache::package_manager::{get_cache_directory_path, get_package_manager_info, SystemRunner};

use crate::cli::CacheDirArgs;

pub async fn run(args: CacheDirArgs) -> Result<()> {
    let runner = SystemRunner;
    let name = args.package_manager.as_str();

    let info = get_package_manager_info(&runner, name)
        .await?
        .with_context(|| format!("Caching for '{}' is not supported", name))?;

    let cache_path = get_cache_directory_path(&runner, &info, name).await?;

    println!("Package manager: {} ({})", name, info.command_line());
    println!("Cache directory: {}", cache_path.display());
    println!(
        "Exists: {}",
        if cache_path.exists() { "yes" } else { "no" }
    );

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    match info.find_lock_file(&cwd) {
        Some(lock_file) => println!("Lock file: {}", lock_file.display()),
        None => println!(
            "Lock file: none found (looked for {})",
            info.lock_file_patterns.join(", ")
        ),
    }

    Ok(())
}
