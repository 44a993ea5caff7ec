//! Dynamic schema context
//!
//! Facts about the surroundings of a node that a schema type may consult to
//! decide its own shape: the keys already defined next to it, its path from
//! the document root and the tree it came from.

use std::cell::OnceCell;
use std::collections::BTreeSet;

use crate::parser::ast::AstNode;
use crate::parser::structure::SNode;
use crate::path::YamlPath;

#[derive(Debug, Clone, Copy)]
pub enum ContextSource<'a> {
    Empty,
    Ast(&'a AstNode),
    Structure(SNode<'a>),
}

#[derive(Debug)]
pub struct DynamicSchemaContext<'a> {
    path: YamlPath,
    source: ContextSource<'a>,
    extra: Vec<String>,
    defined: OnceCell<BTreeSet<String>>,
}

impl DynamicSchemaContext<'static> {
    /// A context that knows nothing.
    pub fn empty() -> Self {
        DynamicSchemaContext::new(YamlPath::EMPTY, ContextSource::Empty)
    }
}

impl<'a> DynamicSchemaContext<'a> {
    pub fn new(path: YamlPath, source: ContextSource<'a>) -> Self {
        Self {
            path,
            source,
            extra: Vec::new(),
            defined: OnceCell::new(),
        }
    }

    pub fn from_ast(path: YamlPath, node: &'a AstNode) -> Self {
        Self::new(path, ContextSource::Ast(node))
    }

    pub fn from_structure(path: YamlPath, node: SNode<'a>) -> Self {
        Self::new(path, ContextSource::Structure(node))
    }

    /// Keys that belong to this node but live outside its tree, e.g. keys
    /// of blocks the YAML parser had to skip.
    pub fn with_extra_properties(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.extra.extend(keys);
        self.defined = OnceCell::new();
        self
    }

    /// Path from the document root, document index first.
    pub fn path(&self) -> &YamlPath {
        &self.path
    }

    pub fn source(&self) -> ContextSource<'a> {
        self.source
    }

    pub fn ast_node(&self) -> Option<&'a AstNode> {
        match self.source {
            ContextSource::Ast(node) => Some(node),
            _ => None,
        }
    }

    pub fn structure_node(&self) -> Option<SNode<'a>> {
        match self.source {
            ContextSource::Structure(node) => Some(node),
            _ => None,
        }
    }

    /// Names of the keys defined directly in this node. Computed on first use.
    pub fn defined_properties(&self) -> &BTreeSet<String> {
        self.defined.get_or_init(|| {
            let mut keys: BTreeSet<String> = match self.source {
                ContextSource::Empty => BTreeSet::new(),
                ContextSource::Ast(node) => {
                    node.key_names().into_iter().map(str::to_string).collect()
                }
                ContextSource::Structure(node) => {
                    node.child_keys().into_iter().map(str::to_string).collect()
                }
            };
            keys.extend(self.extra.iter().cloned());
            keys
        })
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defined_properties().contains(name)
    }

    /// Scalar value of the sibling key `name`, if it has one.
    pub fn property_value(&self, name: &str) -> Option<String> {
        match self.source {
            ContextSource::Empty => None,
            ContextSource::Ast(node) => node.get(name)?.as_scalar().map(str::to_string),
            ContextSource::Structure(node) => node
                .child_with_key(name)?
                .simple_value()
                .map(str::to_string),
        }
    }
}
