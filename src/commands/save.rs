/// `depcache save` command implementation
///
/// Wires the production collaborators (process environment, child processes,
/// the GitHub Actions cache service) into the save orchestrator.
use anyhow::{Context, Result};

use depcache::actions::{ActionInputs, EnvState};
use depcache::config::DepcacheConfig;
use depcache::package_manager::SystemRunner;
use depcache::save::{self, SaveOutcome, PACKAGE_MANAGER_INPUT, SKIP_SAVE_INPUT};
use depcache::storage::GithubActionsCache;

use crate::cli::SaveArgs;

pub async fn run(args: SaveArgs) -> Result<SaveOutcome> {
    let mut inputs = ActionInputs::from_env();

    if let Some(package_manager) = &args.package_manager {
        inputs.set(PACKAGE_MANAGER_INPUT, package_manager.as_str());
    }
    if args.skip_save {
        inputs.set(SKIP_SAVE_INPUT, "true");
    }
    // Same default as the action metadata, for runs outside a workflow
    inputs.set_default(SKIP_SAVE_INPUT, "false");

    if save::skip_requested(&inputs)? {
        return Ok(SaveOutcome::Skipped);
    }

    let config = DepcacheConfig::load(args.config.as_deref())?;
    let options = config
        .upload_options()
        .context("Invalid upload configuration")?;
    let store = GithubActionsCache::from_env(options)?;

    let ctx = save::SaveContext {
        inputs: &inputs,
        state: &EnvState,
        runner: &SystemRunner,
        store: &store,
    };

    save::run(&ctx).await
}
