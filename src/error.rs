//! Error types shared across the engine

use thiserror::Error;

/// Rejected construction of a [`Traversal`](crate::path::Traversal).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError {
    /// An operand can match the empty traversal, which would make the
    /// resulting traversal ambiguous with the identity (or never terminate).
    #[error("invalid traversal: {0}")]
    InvalidTraversal(String),
}

/// A scalar value that does not satisfy its atomic type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValueParseError {
    pub message: String,
    /// Optional sub-range (relative to the value start) that is at fault.
    pub highlight: Option<(usize, usize)>,
    /// The value is accepted but deprecated.
    pub deprecated: bool,
    /// Suggested replacement text for the value.
    pub replacement: Option<String>,
}

impl ValueParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            highlight: None,
            deprecated: false,
            replacement: None,
        }
    }

    pub fn deprecated(message: impl Into<String>, replacement: Option<String>) -> Self {
        Self {
            deprecated: true,
            replacement,
            ..Self::new(message)
        }
    }

    pub fn with_highlight(mut self, start: usize, end: usize) -> Self {
        self.highlight = Some((start, end));
        self
    }
}

/// A constraint that could not be evaluated.
#[derive(Debug, Clone, Error)]
#[error("constraint failed: {0}")]
pub struct ConstraintError(pub String);

/// Failure to load a dialect declared in YAML.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("failed to read dialect file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed dialect definition: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown type '{name}' referenced from '{from}'")]
    UnknownType { name: String, from: String },
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid type definition '{0}': {1}")]
    InvalidType(String, String),
}

/// Failure while building a property index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("property index build cancelled")]
    Cancelled,
    #[error("property index build failed: {0}")]
    Failed(String),
}
