//! Configuration
//!
//! Both the reactive runtime and the component layer are configured through
//! plain serde structs. Every field has a default, so a partial JSON document
//! (or none at all) is a valid configuration.
//!
//! ```rust
//! use fly_core::config::Config;
//!
//! let config = Config::from_json(r#"{ "runtime": { "max_flush_runs": 500 } }"#).unwrap();
//! assert_eq!(config.runtime.max_flush_runs, 500);
//! assert_eq!(config.components.directive_prefix, "fly-");
//! ```

use serde::{Deserialize, Serialize};

/// Default upper bound on subscriber runs within a single flush.
pub const DEFAULT_MAX_FLUSH_RUNS: usize = 100_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub components: ComponentConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Settings for the per-thread reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of subscriber runs a single flush may execute before it
    /// is aborted with [`ReactiveError::FlushLimitExceeded`].
    ///
    /// [`ReactiveError::FlushLimitExceeded`]: crate::error::ReactiveError::FlushLimitExceeded
    pub max_flush_runs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_runs: DEFAULT_MAX_FLUSH_RUNS,
        }
    }
}

/// Attribute and event naming used by the component layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Prefix shared by every directive attribute, e.g. `fly-text`.
    pub directive_prefix: String,
    /// Attribute marking an element as a component root. Its value is the
    /// component name.
    pub reactive_attribute: String,
    /// Attribute stamped on a component root with its generated id.
    pub id_attribute: String,
    /// Prefix of lifecycle event names, e.g. `fly:reactive:<id>`.
    pub event_prefix: String,
}

impl ComponentConfig {
    /// Full attribute name of a directive, e.g. `data` -> `fly-data`.
    pub fn directive_attribute(&self, name: &str) -> String {
        if name.starts_with(&self.directive_prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.directive_prefix, name)
        }
    }
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            directive_prefix: "fly-".to_string(),
            reactive_attribute: "reactive".to_string(),
            id_attribute: "data-reactive-id".to_string(),
            event_prefix: "fly:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.runtime.max_flush_runs, DEFAULT_MAX_FLUSH_RUNS);
    }

    #[test]
    fn partial_component_section_keeps_other_defaults() {
        let config = Config::from_json(r#"{ "components": { "directive_prefix": "x-" } }"#).unwrap();
        assert_eq!(config.components.directive_prefix, "x-");
        assert_eq!(config.components.reactive_attribute, "reactive");
    }

    #[test]
    fn directive_attribute_adds_prefix_once() {
        let components = ComponentConfig::default();
        assert_eq!(components.directive_attribute("text"), "fly-text");
        assert_eq!(components.directive_attribute("fly-text"), "fly-text");
    }
}
