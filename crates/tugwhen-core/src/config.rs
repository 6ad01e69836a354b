//! Stubbing configuration.
//!
//! Each setting remembers where its value came from so that a higher
//! precedence source always wins when configurations are merged.
//!
//! Precedence (highest to lowest):
//! 1. Explicit overrides passed by the test
//! 2. Environment variables
//! 3. Built-in defaults
//!
//! | Setting | Environment variable | Default |
//! |---------|---------------------|---------|
//! | `keyword_match` | `TUGWHEN_KWARGS_MATCH` (`exact` or `subset`) | `exact` |
//! | `receiver_names` | `TUGWHEN_RECEIVER_NAMES` (comma separated) | `self` |

use tracing::warn;

use crate::matcher::KeywordMatch;

/// Environment variable selecting the `**kwargs` matching mode.
pub const KWARGS_MATCH_ENV: &str = "TUGWHEN_KWARGS_MATCH";

/// Environment variable listing receiver parameter names.
pub const RECEIVER_NAMES_ENV: &str = "TUGWHEN_RECEIVER_NAMES";

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From environment variable.
    EnvVar = 1,
    /// Set explicitly by the test (highest precedence).
    Explicit = 2,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Explicit settings supplied by a test.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub keyword_match: Option<KeywordMatch>,
    pub receiver_names: Option<Vec<String>>,
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Settings that shape how calls are bound and matched.
#[derive(Debug, Clone, PartialEq)]
pub struct StubConfig {
    /// How `**kwargs` groups compare.
    pub keyword_match: ConfigValue<KeywordMatch>,
    /// First-parameter names that mark a method receiver.
    pub receiver_names: ConfigValue<Vec<String>>,
}

impl Default for StubConfig {
    fn default() -> Self {
        StubConfig {
            keyword_match: ConfigValue::new(KeywordMatch::default(), ConfigSource::Default),
            receiver_names: ConfigValue::new(vec!["self".to_string()], ConfigSource::Default),
        }
    }
}

impl StubConfig {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        Self::resolve(&ConfigOverrides::default())
    }

    /// Resolve configuration from all sources.
    pub fn resolve(overrides: &ConfigOverrides) -> Self {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve configuration reading variables through `lookup`.
    pub fn resolve_with<F>(overrides: &ConfigOverrides, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = StubConfig::default();
        config.apply_env_vars(lookup);
        config.apply_overrides(overrides);
        config
    }

    fn apply_env_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(KWARGS_MATCH_ENV) {
            match KeywordMatch::parse(&raw) {
                Some(mode) => {
                    self.keyword_match = self
                        .keyword_match
                        .clone()
                        .merge(ConfigValue::new(mode, ConfigSource::EnvVar));
                }
                None => warn!(
                    variable = KWARGS_MATCH_ENV,
                    value = %raw,
                    "ignoring unknown keyword match mode"
                ),
            }
        }

        if let Some(raw) = lookup(RECEIVER_NAMES_ENV) {
            let names: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                warn!(variable = RECEIVER_NAMES_ENV, "ignoring empty receiver name list");
            } else {
                self.receiver_names = self
                    .receiver_names
                    .clone()
                    .merge(ConfigValue::new(names, ConfigSource::EnvVar));
            }
        }
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(mode) = overrides.keyword_match {
            self.keyword_match = ConfigValue::new(mode, ConfigSource::Explicit);
        }
        if let Some(ref names) = overrides.receiver_names {
            self.receiver_names = ConfigValue::new(names.clone(), ConfigSource::Explicit);
        }
    }

    /// Explicitly set the keyword match mode.
    pub fn with_keyword_match(mut self, mode: KeywordMatch) -> Self {
        self.keyword_match = ConfigValue::new(mode, ConfigSource::Explicit);
        self
    }

    /// Explicitly set the receiver names.
    pub fn with_receiver_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.receiver_names = ConfigValue::new(names, ConfigSource::Explicit);
        self
    }

    pub fn keyword_match(&self) -> KeywordMatch {
        self.keyword_match.value
    }

    pub fn receiver_names(&self) -> &[String] {
        &self.receiver_names.value
    }

    /// Returns true if `name` marks a method receiver.
    pub fn is_receiver(&self, name: &str) -> bool {
        self.receiver_names.value.iter().any(|n| n == name)
    }
}

// ============================================================================
// Tests
// ============================================================================
