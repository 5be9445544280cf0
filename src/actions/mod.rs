//! Minimal GitHub Actions toolkit
//!
//! Covers the three pieces of the runner protocol a post-job step needs:
//! reading step inputs, reading state saved by the main step, and emitting
//! workflow commands.

pub mod command;
pub mod inputs;
pub mod state;

pub use command::{escape_data, issue, set_failed};
pub use inputs::ActionInputs;
pub use state::{EnvState, MemoryState, State, StateStore};
