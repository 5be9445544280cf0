/// Step input access
///
/// The runner exposes every `with:` input of a step as an environment variable
/// named `INPUT_<NAME>`, upper-cased, with spaces replaced by underscores.
/// Hyphens are kept, so `cache-skip-save` arrives as `INPUT_CACHE-SKIP-SAVE`.
use anyhow::{bail, Result};
use std::collections::HashMap;

const INPUT_PREFIX: &str = "INPUT_";

/// Values accepted as `true` by YAML 1.2 core schema
const TRUE_VALUES: [&str; 3] = ["true", "True", "TRUE"];
/// Values accepted as `false` by YAML 1.2 core schema
const FALSE_VALUES: [&str; 3] = ["false", "False", "FALSE"];

/// Read-only snapshot of the inputs passed to the current step
#[derive(Debug, Clone, Default)]
pub struct ActionInputs {
    values: HashMap<String, String>,
}

impl ActionInputs {
    /// Snapshot every `INPUT_*` variable from the process environment
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars_os()
                .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
                .filter(|(name, _)| name.starts_with(INPUT_PREFIX))
                .collect(),
        }
    }

    /// Build inputs by looking up each of `names` through `env_lookup`
    pub fn from_lookup<F>(names: &[&str], env_lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = names
            .iter()
            .filter_map(|name| {
                let var = env_name(name);
                env_lookup(&var).map(|value| (var, value))
            })
            .collect();

        Self { values }
    }

    /// Build inputs from `(input name, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut inputs = Self::default();
        for (name, value) in pairs {
            inputs.set(name.as_ref(), value);
        }
        inputs
    }

    /// Override an input (used for CLI flags)
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(env_name(name), value.into());
    }

    /// Set an input only if the step did not provide it
    pub fn set_default(&mut self, name: &str, value: impl Into<String>) {
        self.values.entry(env_name(name)).or_insert_with(|| value.into());
    }

    /// Get an input value, trimmed; empty when the input is absent
    pub fn get_input(&self, name: &str) -> String {
        self.values
            .get(&env_name(name))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    }

    /// Get a boolean input following YAML 1.2 core schema
    ///
    /// Anything other than `true | True | TRUE | false | False | FALSE` is an
    /// error, including an absent input.
    pub fn get_boolean_input(&self, name: &str) -> Result<bool> {
        let value = self.get_input(name);

        if TRUE_VALUES.contains(&value.as_str()) {
            return Ok(true);
        }
        if FALSE_VALUES.contains(&value.as_str()) {
            return Ok(false);
        }

        bail!(
            "Input does not meet YAML 1.2 \"Core Schema\" specification: {}\n\
             Support boolean input list: `true | True | TRUE | false | False | FALSE`",
            name
        )
    }
}

/// Environment variable name carrying input `name`
pub fn env_name(name: &str) -> String {
    format!("{}{}", INPUT_PREFIX, name.replace(' ', "_").to_uppercase())
}
