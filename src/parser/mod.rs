//! Parsers for YAML documents
//!
//! Two views of the same text: a lenient indentation-based
//! [`structure::StructureTree`] that never fails, and a real YAML
//! [`ast::YamlAst`] that isolates syntax errors to the smallest block.

pub mod ast;
pub mod structure;

pub use ast::{AstKind, AstNode, YamlAst};
pub use structure::{SNode, SNodeKind, StructureTree};
