//! Post-job cache save
//!
//! Runs after the job's steps have finished. The restore step earlier in the
//! job left two values in step state: the primary key computed for this run
//! and the key it actually restored. The dependency cache is uploaded only
//! when the restore step did not already hit the primary key exactly.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::actions::{ActionInputs, State, StateStore};
use crate::package_manager::{get_cache_directory_path, get_package_manager_info, CommandRunner};
use crate::storage::{CacheStore, CACHE_NOT_SAVED};

/// Input that disables saving
pub const SKIP_SAVE_INPUT: &str = "cache-skip-save";
/// Input naming the package manager
pub const PACKAGE_MANAGER_INPUT: &str = "cache";

/// Collaborators of a save run
pub struct SaveContext<'a> {
    pub inputs: &'a ActionInputs,
    pub state: &'a dyn StateStore,
    pub runner: &'a dyn CommandRunner,
    pub store: &'a dyn CacheStore,
}

/// How a save run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// `cache-skip-save` was set
    Skipped,
    /// The package manager has no cache support
    Unsupported { package_manager: String },
    /// The restore step already hit the primary key
    CacheHit { key: String },
    /// The store declined to save
    NotSaved,
    Saved { cache_id: i64, key: String },
}

/// Run the post-job save
///
/// Returns `Err` when the step should be marked failed.
pub async fn run(ctx: &SaveContext<'_>) -> Result<SaveOutcome> {
    if skip_requested(ctx.inputs)? {
        return Ok(SaveOutcome::Skipped);
    }

    let package_manager = ctx.inputs.get_input(PACKAGE_MANAGER_INPUT);
    cache_packages(ctx, &package_manager).await
}

/// Whether `cache-skip-save` is set
///
/// Callers that build expensive collaborators check this first, so a skipped
/// run touches nothing else.
pub fn skip_requested(inputs: &ActionInputs) -> Result<bool> {
    let skip = inputs.get_boolean_input(SKIP_SAVE_INPUT)?;
    if skip {
        info!("Skipping cache save");
    }
    Ok(skip)
}

async fn cache_packages(ctx: &SaveContext<'_>, package_manager: &str) -> Result<SaveOutcome> {
    let matched_key = ctx.state.get_state(State::CacheMatchedKey.as_str());
    let primary_key = ctx.state.get_state(State::CachePrimaryKey.as_str());

    let Some(info) = get_package_manager_info(ctx.runner, package_manager).await? else {
        debug!("Caching for '{}' is not supported", package_manager);
        return Ok(SaveOutcome::Unsupported {
            package_manager: package_manager.to_string(),
        });
    };

    let cache_path = get_cache_directory_path(ctx.runner, &info, package_manager).await?;

    if !cache_path.exists() {
        anyhow::bail!(
            "Cache folder path is retrieved for {} but doesn't exist on disk: {}",
            package_manager,
            cache_path.display()
        );
    }

    if primary_key == matched_key {
        info!(
            "Cache hit occurred on the primary key {}, not saving cache.",
            primary_key
        );
        return Ok(SaveOutcome::CacheHit { key: primary_key });
    }

    let paths: [PathBuf; 1] = [cache_path];
    let cache_id = ctx.store.save_cache(&paths, &primary_key).await?;
    if cache_id == CACHE_NOT_SAVED {
        return Ok(SaveOutcome::NotSaved);
    }

    info!(key = %primary_key, cache_id, "Cache saved with the key: {}", primary_key);

    Ok(SaveOutcome::Saved {
        cache_id,
        key: primary_key,
    })
}
