//! Constraints attached to schema types
//!
//! A constraint looks at one node of its type, the keys found directly in
//! it and its dynamic context, and reports problems. Constraints run after
//! the reconcile walk, once per node of their type.

use std::sync::Arc;

use crate::diagnostics::problems::{Problem, ProblemKind};
use crate::error::ConstraintError;
use crate::text::Region;

use super::context::DynamicSchemaContext;
use super::types::YType;

/// A key found in the node being checked, one entry per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundProperty {
    pub name: String,
    pub region: Region,
}

impl FoundProperty {
    pub fn new(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            region,
        }
    }
}

/// What a constraint gets to see.
#[derive(Debug, Clone)]
pub struct ConstraintTarget {
    /// Region of the parent node, if any.
    pub parent: Option<Region>,
    /// Region of the node itself.
    pub node: Region,
    /// Region of the key the node is the value of, if any.
    pub key: Option<Region>,
    pub ty: YType,
    pub found: Vec<FoundProperty>,
}

impl ConstraintTarget {
    /// Where problems about the node as a whole are reported.
    pub fn anchor(&self) -> Region {
        self.key.unwrap_or(self.node)
    }

    fn matching<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = &'a FoundProperty> + 'a {
        self.found.iter().filter(move |f| names.contains(&f.name))
    }
}

pub trait Constraint: Send + Sync {
    fn verify(
        &self,
        context: &DynamicSchemaContext<'_>,
        target: &ConstraintTarget,
    ) -> Result<Vec<Problem>, ConstraintError>;
}

impl<F> Constraint for F
where
    F: Fn(&DynamicSchemaContext<'_>, &ConstraintTarget) -> Result<Vec<Problem>, ConstraintError>
        + Send
        + Sync,
{
    fn verify(
        &self,
        context: &DynamicSchemaContext<'_>,
        target: &ConstraintTarget,
    ) -> Result<Vec<Problem>, ConstraintError> {
        self(context, target)
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn quoted_list(names: &[String]) -> String {
    format!("[{}]", names.join(", "))
}

/// Exactly one of `names` must be present.
pub fn require_one_of(properties: &[&str]) -> impl Constraint {
    let properties = names(properties);
    move |_: &DynamicSchemaContext<'_>, target: &ConstraintTarget| -> Result<Vec<Problem>, ConstraintError> {
        let found: Vec<_> = target.matching(&properties).collect();
        if found.is_empty() {
            return Ok(vec![Problem::new(
                ProblemKind::MissingRequired,
                target.anchor(),
                format!(
                    "One of {} is required for '{}'",
                    quoted_list(&properties),
                    target.ty
                ),
            )]);
        }
        Ok(mutually_exclusive(&properties, &found))
    }
}

/// At most one of `names` may be present.
pub fn require_at_most_one_of(properties: &[&str]) -> impl Constraint {
    let properties = names(properties);
    move |_: &DynamicSchemaContext<'_>, target: &ConstraintTarget| -> Result<Vec<Problem>, ConstraintError> {
        let found: Vec<_> = target.matching(&properties).collect();
        Ok(mutually_exclusive(&properties, &found))
    }
}

fn mutually_exclusive(properties: &[String], found: &[&FoundProperty]) -> Vec<Problem> {
    if found.len() < 2 {
        return Vec::new();
    }
    found
        .iter()
        .map(|f| {
            Problem::new(
                ProblemKind::MutuallyExclusive,
                f.region,
                format!(
                    "Only one of {} should be defined",
                    quoted_list(properties)
                ),
            )
        })
        .collect()
}

/// Flags every occurrence of `names` as deprecated.
pub fn deprecated<M>(message: M, properties: &[&str]) -> impl Constraint
where
    M: Fn(&str) -> String + Send + Sync,
{
    let properties = names(properties);
    move |_: &DynamicSchemaContext<'_>, target: &ConstraintTarget| -> Result<Vec<Problem>, ConstraintError> {
        Ok(target
            .matching(&properties)
            .map(|f| Problem::new(ProblemKind::Deprecated, f.region, message(&f.name)))
            .collect())
    }
}

/// Picks the constraint to apply from the dynamic context.
pub fn context_aware<F>(choose: F) -> impl Constraint
where
    F: Fn(&DynamicSchemaContext<'_>) -> Option<Arc<dyn Constraint>> + Send + Sync,
{
    move |context: &DynamicSchemaContext<'_>, target: &ConstraintTarget| -> Result<Vec<Problem>, ConstraintError> {
        match choose(context) {
            Some(constraint) => constraint.verify(context, target),
            None => Ok(Vec::new()),
        }
    }
}
