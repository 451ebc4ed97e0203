//! Content identifiers of the form `Namespace:path`.
//!
//! Ore types, decorators and synchronized components are named by these
//! keys; `Ord` is lexical by namespace then path so registries iterate the
//! same way on every run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Namespace of the bundled content.
pub const DEFAULT_NAMESPACE: &str = "VanillaBasics";

const MAX_SEGMENT_LEN: usize = 96;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryKeyError {
    #[error("registry key {0:?} has no `:` separator")]
    MissingNamespace(String),
    #[error("empty {0} in registry key")]
    Empty(&'static str),
    #[error("{0} of registry key is longer than {MAX_SEGMENT_LEN} bytes")]
    TooLong(&'static str),
    #[error("invalid character {1:?} in registry key {0}")]
    InvalidChar(&'static str, char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryKey {
    namespace: String,
    path: String,
}

impl RegistryKey {
    pub fn new(namespace: &str, path: &str) -> Result<Self, RegistryKeyError> {
        check_segment("namespace", namespace, |c| c.is_ascii_alphanumeric() || c == '_')?;
        check_segment("path", path, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.')
        })?;
        Ok(Self {
            namespace: namespace.to_owned(),
            path: path.to_owned(),
        })
    }

    /// Bundled content key in [`DEFAULT_NAMESPACE`].
    ///
    /// # Panics
    /// On an invalid path; bundled keys are fixed at compile time.
    pub fn vanilla(path: &str) -> Self {
        match Self::new(DEFAULT_NAMESPACE, path) {
            Ok(key) => key,
            Err(err) => panic!("invalid bundled registry key {path:?}: {err}"),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn check_segment(
    what: &'static str,
    segment: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), RegistryKeyError> {
    if segment.is_empty() {
        return Err(RegistryKeyError::Empty(what));
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(RegistryKeyError::TooLong(what));
    }
    match segment.chars().find(|&c| !allowed(c)) {
        Some(c) => Err(RegistryKeyError::InvalidChar(what, c)),
        None => Ok(()),
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for RegistryKey {
    type Err = RegistryKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, path) = s
            .split_once(':')
            .ok_or_else(|| RegistryKeyError::MissingNamespace(s.to_owned()))?;
        Self::new(namespace, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_ids_parse() {
        let key: RegistryKey = "VanillaBasics:Condition".parse().unwrap();
        assert_eq!(key.namespace(), "VanillaBasics");
        assert_eq!(key.path(), "Condition");
        assert_eq!(key.to_string(), "VanillaBasics:Condition");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(
            "Condition".parse::<RegistryKey>(),
            Err(RegistryKeyError::MissingNamespace("Condition".into()))
        );
        assert_eq!(
            ":coal".parse::<RegistryKey>(),
            Err(RegistryKeyError::Empty("namespace"))
        );
        assert_eq!(
            "VanillaBasics:ore coal".parse::<RegistryKey>(),
            Err(RegistryKeyError::InvalidChar("path", ' '))
        );
        assert!(RegistryKey::new("VanillaBasics", &"a".repeat(97)).is_err());
    }

    #[test]
    fn ordering_is_namespace_then_path() {
        let coal = RegistryKey::vanilla("ore/coal");
        let iron = RegistryKey::vanilla("ore/iron");
        let other = RegistryKey::new("Addon", "ore/zinc").unwrap();
        assert!(coal < iron);
        assert!(other < coal);
    }

    #[test]
    #[should_panic(expected = "invalid bundled registry key")]
    fn vanilla_rejects_invalid_path() {
        RegistryKey::vanilla("bad path");
    }
}
