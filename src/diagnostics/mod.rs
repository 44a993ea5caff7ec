//! Diagnostics module for problem collection and reporting

pub mod problems;
mod reconciler;

pub use problems::{replacement_of, Problem, ProblemCollector, ProblemKind, ProblemSeverity};
pub use reconciler::SchemaReconciler;
