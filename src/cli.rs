use clap::{Parser, Subcommand};
use std::path::PathBuf;

use depcache::package_manager::SUPPORTED;

/// depcache - Post-job dependency cache saver
///
/// Uploads a package manager's dependency cache to the CI cache service at
/// the end of a job, unless the restore step already hit the same key.
#[derive(Parser, Debug)]
#[command(name = "depcache")]
#[command(author = "Tuist Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Post-job dependency cache saver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save the dependency cache (post-job step)
    Save(SaveArgs),

    /// Print the cache directory of a package manager
    CacheDir(CacheDirArgs),
}

#[derive(Parser, Debug)]
pub struct SaveArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "DEPCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Package manager whose cache is saved (overrides the `cache` input)
    #[arg(long)]
    pub package_manager: Option<String>,

    /// Skip saving (overrides the `cache-skip-save` input)
    #[arg(long)]
    pub skip_save: bool,
}

#[derive(Parser, Debug)]
pub struct CacheDirArgs {
    /// Package manager to resolve
    #[arg(value_parser = clap::builder::PossibleValuesParser::new(SUPPORTED))]
    pub package_manager: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_save_defaults() {
        let cli = Cli::try_parse_from(["depcache", "save"]).unwrap();
        match cli.command {
            Commands::Save(args) => {
                assert!(!args.skip_save);
                assert!(args.package_manager.is_none());
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_parse_save_overrides() {
        let cli = Cli::try_parse_from([
            "depcache",
            "save",
            "--package-manager",
            "pnpm",
            "--skip-save",
        ])
        .unwrap();
        match cli.command {
            Commands::Save(args) => {
                assert!(args.skip_save);
                assert_eq!(args.package_manager.as_deref(), Some("pnpm"));
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_cache_dir_rejects_unknown_manager() {
        assert!(Cli::try_parse_from(["depcache", "cache-dir", "bower"]).is_err());
        assert!(Cli::try_parse_from(["depcache", "cache-dir", "yarn"]).is_ok());
    }
}
