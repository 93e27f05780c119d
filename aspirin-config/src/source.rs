//! Where override strings come from.
//!
//! `init` consults a per-call source first, then the process-wide source the
//! registry was built with (the environment unless replaced), then the
//! built-in default.

use std::fmt;

use ahash::AHashMap;
use serde::Deserialize;

use crate::error::ConfigError;

/// A lookup of raw override strings by parameter name
pub trait OverrideSource: Send + Sync + fmt::Debug {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// An explicit set of overrides, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    values: AHashMap<String, String>,
}

/// A single value in a RON override document
#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl Overrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an override, returning `self` for chaining
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a RON map of overrides.
    ///
    /// Values may be strings, integers or booleans; they are kept as strings
    /// and coerced against the parameter type during `init`.
    ///
    /// ```ron
    /// {
    ///     "hostname": "mx.example.com",
    ///     "delivery.attempt.count": 5,
    ///     "delivery.debug": true,
    /// }
    /// ```
    ///
    /// # Errors
    /// [`ConfigError::OverrideFile`] when the document is not such a map.
    pub fn from_ron(document: &str) -> Result<Self, ConfigError> {
        let raw: AHashMap<String, DocumentValue> = ron::from_str(document)?;

        Ok(raw
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    DocumentValue::Text(text) => text,
                    DocumentValue::Integer(number) => number.to_string(),
                    DocumentValue::Boolean(flag) => flag.to_string(),
                };
                (name, value)
            })
            .collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Overrides {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl OverrideSource for Overrides {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }
}

/// Process environment as an override source.
///
/// `delivery.attempt.count` is read from `ASPIRIN_DELIVERY_ATTEMPT_COUNT`:
/// the prefix followed by the upper-cased name with `.` and `-` turned into `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    prefix: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self::with_prefix("ASPIRIN_")
    }
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The variable consulted for parameter `name`
    #[must_use]
    pub fn variable_name(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();

        format!("{}{suffix}", self.prefix)
    }
}

impl OverrideSource for Environment {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(self.variable_name(name)).ok()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_variable_names() {
        let env = Environment::new();
        assert_eq!(
            env.variable_name("delivery.bounce-on-failure"),
            "ASPIRIN_DELIVERY_BOUNCE_ON_FAILURE"
        );
        assert_eq!(
            Environment::with_prefix("MTA_").variable_name("hostname"),
            "MTA_HOSTNAME"
        );
    }

    #[test]
    fn test_environment_misses_unset_variables() {
        let env = Environment::with_prefix("ASPIRIN_TEST_SURELY_UNSET_");
        assert_eq!(env.lookup("hostname"), None);
    }

    #[test]
    fn test_overrides_lookup() {
        let overrides = Overrides::new().with("hostname", "mx.example.com");

        assert_eq!(overrides.lookup("hostname").as_deref(), Some("mx.example.com"));
        assert_eq!(overrides.lookup("encoding"), None);
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn test_overrides_from_ron_stringifies_values() {
        let overrides = Overrides::from_ron(
            r#"{
                "hostname": "mx.example.com",
                "delivery.attempt.count": 5,
                "delivery.debug": true,
            }"#,
        )
        .unwrap();

        assert_eq!(overrides.get("hostname"), Some("mx.example.com"));
        assert_eq!(overrides.get("delivery.attempt.count"), Some("5"));
        assert_eq!(overrides.get("delivery.debug"), Some("true"));
    }

    #[test]
    fn test_overrides_from_ron_rejects_non_maps() {
        let result = Overrides::from_ron(r#"["hostname"]"#);
        assert!(matches!(result, Err(ConfigError::OverrideFile(_))));
    }
}
