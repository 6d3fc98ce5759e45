//! Environment variable lookups behind a small seam.
//!
//! Production code reads the process environment through [`Env::real`];
//! tests build an [`Env`] from explicit pairs so they never mutate global
//! process state.

use std::collections::HashMap;

/// Environment variable reader.
///
/// # Examples
///
/// ```
/// use patchbot_core::Env;
///
/// let env = Env::from_pairs([("MODEL", "gpt-4o-mini")]);
/// assert_eq!(env.var("MODEL").as_deref(), Some("gpt-4o-mini"));
/// assert!(env.var("LANGUAGE").is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Create an `Env` that reads from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Create an `Env` backed only by the given key-value pairs.
    pub fn from_pairs(
        vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Look up a variable. Returns `None` when it is absent or not valid UTF-8.
    pub fn var(&self, name: &str) -> Option<String> {
        match &self.overrides {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    /// Look up the first of several names that holds a non-empty value.
    ///
    /// Used for variables that are accepted in more than one spelling
    /// (`TARGETS` / `targets`).
    pub fn first_var(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.non_empty(name))
    }

    /// Like [`Env::var`], but an empty value counts as absent.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_env_returns_set_values() {
        let env = Env::from_pairs([("FOO", "bar"), ("BAZ", "qux")]);
        assert_eq!(env.var("FOO").as_deref(), Some("bar"));
        assert_eq!(env.var("BAZ").as_deref(), Some("qux"));
    }

    #[test]
    fn pairs_env_does_not_fall_through_to_process() {
        let env = Env::from_pairs(Vec::<(&str, &str)>::new());
        assert!(env.var("PATH").is_none());
    }

    #[test]
    fn first_var_prefers_earlier_names() {
        let env = Env::from_pairs([("TARGETS", "a"), ("targets", "b")]);
        assert_eq!(env.first_var(&["TARGETS", "targets"]).as_deref(), Some("a"));

        let env = Env::from_pairs([("TARGETS", ""), ("targets", "b")]);
        assert_eq!(env.first_var(&["TARGETS", "targets"]).as_deref(), Some("b"));
    }

    #[test]
    fn non_empty_skips_blank_values() {
        let env = Env::from_pairs([("PROMPT", "")]);
        assert!(env.var("PROMPT").is_some());
        assert!(env.non_empty("PROMPT").is_none());
    }
}
