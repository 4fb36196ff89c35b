//! Runtime configuration.
//!
//! Everything has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::diff::DiffConfig;
use crate::error::ConfigError;

/// Configuration for a [`Runtime`](crate::runtime::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Id of the runtime's root scope; prefixes every scope path.
    pub root_id: String,

    /// Keep a diagnostics registry of per-store counters.
    pub diagnostics: bool,

    pub store: StoreConfig,

    pub diff: DiffConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_id: "app".to_string(),
            diagnostics: false,
            store: StoreConfig::default(),
            diff: DiffConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Settings applied to every store a runtime creates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Emit a `trace` event for every committed value.
    pub trace_commits: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.root_id, "app");
        assert!(config.diff.detect_moves);
    }

    #[test]
    fn nested_fields_override() {
        let config = RuntimeConfig::from_json(
            r#"{ "root_id": "todo", "diagnostics": true, "diff": { "detect_moves": false } }"#,
        )
        .unwrap();

        assert_eq!(config.root_id, "todo");
        assert!(config.diagnostics);
        assert!(!config.diff.detect_moves);
        assert!(!config.store.trace_commits);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let error = RuntimeConfig::from_json("{ diagnostics: yes").unwrap_err();
        assert!(error.to_string().starts_with("invalid configuration"));
    }
}
