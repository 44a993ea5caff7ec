//! Engine facade
//!
//! A [`YamlEngine`] binds one dialect to a configuration and answers
//! completion, hover and reconcile requests on plain text. The
//! [`SchemaRegistry`] picks the engine for a document by its URI.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::assist::{CompletionEngine, HoverEngine};
use crate::config::EngineConfig;
use crate::diagnostics::{Problem, ProblemCollector, SchemaReconciler};
use crate::error::SchemaLoadError;
use crate::schema::property_index::{NoIndex, PropertyLookup};
use crate::schema::{load_dialect_file_with, workflows_dialect, Dialect, TypeUtil};

pub use crate::assist::{Completion, CompletionKind, Hover};

pub struct YamlEngine {
    dialect: Dialect,
    util: TypeUtil,
    config: EngineConfig,
}

impl YamlEngine {
    pub fn new(dialect: Dialect, config: EngineConfig) -> Self {
        Self {
            util: TypeUtil::new(config.schema_options()),
            dialect,
            config,
        }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Completions at byte `offset`, best first.
    pub fn complete(&self, text: &str, offset: usize) -> Vec<Completion> {
        CompletionEngine::new(&self.util, self.dialect.root())
            .with_deindented_proposals(self.config.deindented_proposals)
            .complete(text, offset)
    }

    pub fn hover(&self, text: &str, offset: usize) -> Option<Hover> {
        HoverEngine::new(&self.util, self.dialect.root()).hover(text, offset)
    }

    /// Problems in `text`, ordered by position, with configured severities.
    /// Problems configured as ignored are dropped.
    pub fn reconcile(&self, text: &str) -> Vec<Problem> {
        let mut collector = ProblemCollector::with_severities(self.config.severities.clone());
        collector.extend(SchemaReconciler::new(&self.util, &self.dialect).reconcile(text));
        collector.into_problems()
    }
}

impl fmt::Debug for YamlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YamlEngine")
            .field("dialect", &self.dialect.name())
            .field("config", &self.config)
            .finish()
    }
}

/// The dialect engines known to a server.
pub struct SchemaRegistry {
    engines: Vec<Arc<YamlEngine>>,
    config: EngineConfig,
    /// Read by `indexed` types of dialect files.
    index: Arc<dyn PropertyLookup>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("dialects", &self.dialect_names())
            .field("index_available", &self.index.is_available())
            .finish()
    }
}

impl SchemaRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engines: Vec::new(),
            config,
            index: Arc::new(NoIndex),
        }
    }

    /// Property index for dialect files loaded after this call.
    pub fn with_property_index(mut self, index: Arc<dyn PropertyLookup>) -> Self {
        self.index = index;
        self
    }

    /// The built-in dialects and the configured dialect files. Fails on
    /// the first dialect that does not load.
    pub fn with_dialects(config: EngineConfig) -> Result<Self, SchemaLoadError> {
        Self::new(config).try_load_dialects()
    }

    /// Like [`SchemaRegistry::with_dialects`], but skips dialects that fail
    /// to load.
    pub fn load(config: EngineConfig) -> Self {
        Self::new(config).load_dialects()
    }

    pub fn try_load_dialects(mut self) -> Result<Self, SchemaLoadError> {
        self.register(workflows_dialect()?);
        for path in self.config.dialect_files.clone() {
            let dialect = load_dialect_file_with(&path, Arc::clone(&self.index))?;
            self.register(dialect);
        }
        Ok(self)
    }

    pub fn load_dialects(mut self) -> Self {
        match workflows_dialect() {
            Ok(dialect) => self.register(dialect),
            Err(error) => warn!("Built-in workflows dialect unavailable: {}", error),
        }
        for path in self.config.dialect_files.clone() {
            match load_dialect_file_with(&path, Arc::clone(&self.index)) {
                Ok(dialect) => self.register(dialect),
                Err(error) => warn!("Skipping dialect file {}: {}", path.display(), error),
            }
        }
        self
    }

    pub fn register(&mut self, dialect: Dialect) {
        info!("Registered dialect {}", dialect.name());
        self.engines
            .push(Arc::new(YamlEngine::new(dialect, self.config.clone())));
    }

    /// The engine of the first dialect whose file patterns match `uri`.
    pub fn engine_for(&self, uri: &str) -> Option<Arc<YamlEngine>> {
        self.engines
            .iter()
            .find(|engine| engine.dialect().matches(uri))
            .cloned()
    }

    pub fn dialect_names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.dialect().name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{ProblemKind, ProblemSeverity};
    use crate::schema::load_dialect_str;

    const DIALECT: &str = r#"
name: service
files: ['\.service\.ya?ml$']
root: Service
types:
  - name: Service
    kind: bean
    properties:
      - name: name
        type: String
        required: true
      - name: port
        type: integer
"#;

    #[test]
    fn test_registry_picks_engine_by_uri() {
        let mut registry = SchemaRegistry::with_dialects(EngineConfig::default()).unwrap();
        registry.register(load_dialect_str(DIALECT).unwrap());
        assert_eq!(registry.dialect_names(), vec!["gcp-workflows", "service"]);

        let engine = registry.engine_for("file:///a/api.service.yaml").unwrap();
        assert_eq!(engine.dialect().name(), "service");
        let engine = registry.engine_for("file:///a/deploy.workflows.yaml").unwrap();
        assert_eq!(engine.dialect().name(), "gcp-workflows");
        assert!(registry.engine_for("file:///a/other.yaml").is_none());
    }

    #[test]
    fn test_configured_severities_apply() {
        let mut config = EngineConfig::default();
        config
            .severities
            .insert(ProblemKind::UnknownProperty, ProblemSeverity::Warning);
        config
            .severities
            .insert(ProblemKind::MissingRequired, ProblemSeverity::Ignore);
        let engine = YamlEngine::new(load_dialect_str(DIALECT).unwrap(), config);
        let problems = engine.reconcile("port: 80\nother: 1\n");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::UnknownProperty);
        assert_eq!(problems[0].severity, ProblemSeverity::Warning);
    }

    #[test]
    fn test_engine_answers_requests() {
        let engine = YamlEngine::new(load_dialect_str(DIALECT).unwrap(), EngineConfig::default());
        let completions = engine.complete("", 0);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].label, "name");
        assert!(engine.hover("name: x\n", 1).is_some());
    }

    #[test]
    fn test_missing_dialect_file() {
        let config = EngineConfig {
            dialect_files: vec!["/nonexistent/dialect.yml".into()],
            ..EngineConfig::default()
        };
        assert!(SchemaRegistry::with_dialects(config.clone()).is_err());
        assert_eq!(SchemaRegistry::load(config).dialect_names(), vec!["gcp-workflows"]);
    }

    #[test]
    fn test_registry_debug_lists_dialects() {
        let registry = SchemaRegistry::load(EngineConfig::default());
        let debug = format!("{:?}", registry);
        assert!(debug.contains("gcp-workflows"), "{}", debug);
        assert!(debug.contains("index_available: false"), "{}", debug);

        let result = SchemaRegistry::with_dialects(EngineConfig::default());
        assert!(format!("{:?}", result).starts_with("Ok(SchemaRegistry"));
    }
}
