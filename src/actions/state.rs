/// Cross-step state
///
/// The main step of an action saves values with `save-state`; the runner
/// hands them back to the post step as `STATE_<name>` environment variables.
use std::collections::HashMap;
use std::fmt;

const STATE_PREFIX: &str = "STATE_";

/// Well-known state names shared with the restore step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Primary key computed for this run
    CachePrimaryKey,
    /// Key the restore step matched (empty on a miss)
    CacheMatchedKey,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CachePrimaryKey => "CACHE_KEY",
            Self::CacheMatchedKey => "CACHE_RESULT",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only access to state saved by an earlier step
pub trait StateStore: Send + Sync {
    /// Value saved under `name`, or an empty string
    fn get_state(&self, name: &str) -> String;
}

/// State read from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvState;

impl StateStore for EnvState {
    fn get_state(&self, name: &str) -> String {
        std::env::var(format!("{}{}", STATE_PREFIX, name)).unwrap_or_default()
    }
}

/// In-memory state, for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    values: HashMap<String, String>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, state: State, value: impl Into<String>) -> Self {
        self.values.insert(state.as_str().to_string(), value.into());
        self
    }
}

impl StateStore for MemoryState {
    fn get_state(&self, name: &str) -> String {
        self.values.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_state_names() {
        assert_eq!(State::CachePrimaryKey.as_str(), "CACHE_KEY");
        assert_eq!(State::CacheMatchedKey.to_string(), "CACHE_RESULT");
    }

    #[test]
    fn test_memory_state() {
        let state = MemoryState::new().with(State::CachePrimaryKey, "K1");
        assert_eq!(state.get_state("CACHE_KEY"), "K1");
        assert_eq!(state.get_state("CACHE_RESULT"), "");
    }

    #[test]
    #[serial]
    fn test_env_state() {
        std::env::set_var("STATE_CACHE_KEY", "node-cache-abc");
        std::env::remove_var("STATE_CACHE_RESULT");

        assert_eq!(EnvState.get_state("CACHE_KEY"), "node-cache-abc");
        assert_eq!(EnvState.get_state("CACHE_RESULT"), "");

        std::env::remove_var("STATE_CACHE_KEY");
    }
}
