//! Engine configuration
//!
//! Read from the LSP `initializationOptions`. Every field has a default, so
//! an empty object (or no options at all) gives the default configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diagnostics::{ProblemKind, ProblemSeverity};
use crate::schema::SchemaOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Severity overrides per problem kind, e.g. `{"unknown-property": "warning"}`.
    pub severities: HashMap<ProblemKind, ProblemSeverity>,
    pub tiered_proposals: bool,
    pub suggest_deprecated_properties: bool,
    pub relaxed_names: bool,
    /// Propose keys of outer blocks on a more indented line, removing the
    /// extra indentation.
    pub deindented_proposals: bool,
    pub index_idle_ttl_secs: u64,
    /// YAML dialect definitions loaded next to the built-in dialects.
    pub dialect_files: Vec<PathBuf>,
    /// JSON property metadata read by `indexed` types of dialect files.
    pub property_metadata: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            severities: HashMap::new(),
            tiered_proposals: true,
            suggest_deprecated_properties: false,
            relaxed_names: false,
            deindented_proposals: true,
            index_idle_ttl_secs: 300,
            dialect_files: Vec::new(),
            property_metadata: None,
        }
    }
}

impl EngineConfig {
    /// Parses `initializationOptions`. Malformed options fall back to the
    /// defaults.
    pub fn from_init_options(options: Option<serde_json::Value>) -> Self {
        let Some(options) = options else {
            return Self::default();
        };
        serde_json::from_value(options).unwrap_or_else(|error| {
            warn!("Ignoring malformed initialization options: {}", error);
            Self::default()
        })
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            tiered_optional_proposals: self.tiered_proposals,
            suggest_deprecated_properties: self.suggest_deprecated_properties,
            relaxed_names: self.relaxed_names,
        }
    }

    pub fn index_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.index_idle_ttl_secs)
    }
}
