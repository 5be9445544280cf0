mod cli;
mod commands;

use clap::Parser;
use std::process::ExitCode;

use cli::{Cli, Commands};
use depcache::{actions, logging, panic_guard};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    logging::init();

    panic_guard::install();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch to appropriate command handler
    let result = match cli.command {
        Commands::Save(args) => commands::save::run(args).await.map(|_| ()),
        Commands::CacheDir(args) => commands::cache_dir::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => actions::set_failed(&format!("{:#}", e)),
    }
}
