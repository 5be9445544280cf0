// Library interface for depcache
// This allows integration tests and external code to use depcache's modules

pub mod actions;
pub mod config;
pub mod logging;
pub mod package_manager;
pub mod panic_guard;
pub mod save;
pub mod storage;

// Re-export commonly used types
pub use actions::{ActionInputs, EnvState, MemoryState, State, StateStore};
pub use package_manager::{CommandOutput, CommandRunner, PackageManagerInfo, SystemRunner};
pub use save::{SaveContext, SaveOutcome};
pub use storage::{CacheStore, GithubActionsCache, CACHE_NOT_SAVED};
