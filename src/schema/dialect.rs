//! Dialect registration

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::SchemaLoadError;

use super::constraints::Constraint;
use super::types::YType;

/// A YAML dialect: the type of its documents, the constraints that apply to
/// each document root and the files it is used for.
#[derive(Clone)]
pub struct Dialect {
    name: String,
    file_patterns: Vec<Regex>,
    root: YType,
    constraints: Vec<Arc<dyn Constraint>>,
}

impl Dialect {
    pub fn new(name: impl Into<String>, root: YType) -> Self {
        Self {
            name: name.into(),
            file_patterns: Vec::new(),
            root,
            constraints: Vec::new(),
        }
    }

    /// Adds a regex matched against document URIs.
    pub fn with_file_pattern(mut self, pattern: &str) -> Result<Self, SchemaLoadError> {
        let regex = Regex::new(pattern).map_err(|source| SchemaLoadError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.file_patterns.push(regex);
        Ok(self)
    }

    /// Adds a constraint checked on every document root.
    pub fn require<C: Constraint + 'static>(mut self, constraint: C) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &YType {
        &self.root
    }

    pub fn constraints(&self) -> &[Arc<dyn Constraint>] {
        &self.constraints
    }

    pub fn file_patterns(&self) -> &[Regex] {
        &self.file_patterns
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.file_patterns.iter().any(|p| p.is_match(uri))
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.name)
            .field("root", &self.root)
            .field(
                "file_patterns",
                &self.file_patterns.iter().map(Regex::as_str).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::bean;
    use assert_matches::assert_matches;

    #[test]
    fn test_file_patterns() {
        let dialect = Dialect::new("manifest", bean("Manifest", Vec::new()))
            .with_file_pattern(r"manifest\.ya?ml$")
            .unwrap();
        assert!(dialect.matches("file:///app/manifest.yml"));
        assert!(!dialect.matches("file:///app/pipeline.yml"));
        assert_matches!(
            Dialect::new("bad", bean("X", Vec::new())).with_file_pattern("("),
            Err(SchemaLoadError::Pattern { .. })
        );
    }
}
