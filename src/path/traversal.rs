//! Composable, ambiguous traversals
//!
//! A [`Traversal`] describes a route through any [`Navigable`] graph. Every
//! step may yield zero, one or many results, and results are produced lazily.
//! Traversals are immutable and cheap to clone, so the same value can be run
//! any number of times over the same input.

use std::collections::VecDeque;
use std::fmt;
use std::iter;
use std::sync::Arc;

use crate::error::TraversalError;

use super::{Navigable, PathSegment, YamlPath};

#[derive(Debug, PartialEq, Eq)]
enum TraversalKind {
    Empty,
    Segment(PathSegment),
    Path(YamlPath),
    Sequence(Traversal, Traversal),
    Alternative(Traversal, Traversal),
    Repeat(Traversal),
}

/// An immutable route expression.
#[derive(Clone, PartialEq, Eq)]
pub struct Traversal(Arc<TraversalKind>);

impl Traversal {
    fn of(kind: TraversalKind) -> Self {
        Traversal(Arc::new(kind))
    }

    /// The identity traversal.
    pub fn empty() -> Self {
        Self::of(TraversalKind::Empty)
    }

    pub fn segment(segment: PathSegment) -> Self {
        Self::of(TraversalKind::Segment(segment))
    }

    pub fn path(path: YamlPath) -> Self {
        Self::of(TraversalKind::Path(path))
    }

    /// `self` then `next` from each result of `self`.
    pub fn then(&self, next: Traversal) -> Self {
        if self.is_identity() {
            return next;
        }
        if next.is_identity() {
            return self.clone();
        }
        Self::of(TraversalKind::Sequence(self.clone(), next))
    }

    /// Convenience for `self.then(Traversal::segment(segment))`.
    pub fn then_segment(&self, segment: PathSegment) -> Self {
        self.then(Traversal::segment(segment))
    }

    /// Union of `a` and `b` applied to the same start node.
    ///
    /// Both operands must be unable to match the empty traversal.
    pub fn alternative(a: Traversal, b: Traversal) -> Result<Self, TraversalError> {
        for operand in [&a, &b] {
            if operand.can_empty() {
                return Err(TraversalError::InvalidTraversal(format!(
                    "alternative operand {operand:?} can match the empty traversal"
                )));
            }
        }
        Ok(Self::of(TraversalKind::Alternative(a, b)))
    }

    /// Zero or more applications of `step`, breadth first.
    pub fn repeat(step: Traversal) -> Result<Self, TraversalError> {
        if step.can_empty() {
            return Err(TraversalError::InvalidTraversal(format!(
                "repeated step {step:?} can match the empty traversal"
            )));
        }
        Ok(Self::of(TraversalKind::Repeat(step)))
    }

    /// Whether this traversal can return its start node without moving.
    pub fn can_empty(&self) -> bool {
        match &*self.0 {
            TraversalKind::Empty => true,
            TraversalKind::Segment(_) => false,
            TraversalKind::Path(path) => path.is_empty(),
            TraversalKind::Sequence(a, b) => a.can_empty() && b.can_empty(),
            TraversalKind::Alternative(a, b) => a.can_empty() || b.can_empty(),
            TraversalKind::Repeat(_) => true,
        }
    }

    fn is_identity(&self) -> bool {
        match &*self.0 {
            TraversalKind::Empty => true,
            TraversalKind::Path(path) => path.is_empty(),
            _ => false,
        }
    }

    /// Lazily yields every node this traversal reaches from `start`.
    pub fn traverse_ambiguously<'a, N: Navigable<'a>>(
        &self,
        start: &N,
    ) -> Box<dyn Iterator<Item = N> + 'a> {
        match &*self.0 {
            TraversalKind::Empty => Box::new(iter::once(start.clone())),
            TraversalKind::Segment(segment) => start.traverse_ambiguously(segment),
            TraversalKind::Path(path) => {
                let mut results: Box<dyn Iterator<Item = N> + 'a> =
                    Box::new(iter::once(start.clone()));
                for segment in path.segments() {
                    let segment = segment.clone();
                    results =
                        Box::new(results.flat_map(move |node| node.traverse_ambiguously(&segment)));
                }
                results
            }
            TraversalKind::Sequence(a, b) => {
                let b = b.clone();
                Box::new(
                    a.traverse_ambiguously(start)
                        .flat_map(move |node| b.traverse_ambiguously(&node)),
                )
            }
            TraversalKind::Alternative(a, b) => Box::new(
                a.traverse_ambiguously(start)
                    .chain(b.traverse_ambiguously(start)),
            ),
            TraversalKind::Repeat(step) => Box::new(RepeatIter::new(step.clone(), start.clone())),
        }
    }

    /// First result, for callers that want a single answer.
    pub fn traverse<'a, N: Navigable<'a>>(&self, start: &N) -> Option<N> {
        self.traverse_ambiguously(start).next()
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            TraversalKind::Empty => f.write_str("Empty"),
            TraversalKind::Segment(s) => write!(f, "{s}"),
            TraversalKind::Path(p) => write!(f, "{}", p.to_nav_string()),
            TraversalKind::Sequence(a, b) => write!(f, "{a:?}{b:?}"),
            TraversalKind::Alternative(a, b) => write!(f, "({a:?}|{b:?})"),
            TraversalKind::Repeat(s) => write!(f, "({s:?})*"),
        }
    }
}

impl From<YamlPath> for Traversal {
    fn from(path: YamlPath) -> Self {
        Traversal::path(path)
    }
}

impl From<PathSegment> for Traversal {
    fn from(segment: PathSegment) -> Self {
        Traversal::segment(segment)
    }
}

/// Breadth-first expansion of a repeated step. The queue holds the pending
/// result streams of each level, so nothing is computed ahead of demand.
struct RepeatIter<'a, N> {
    step: Traversal,
    queue: VecDeque<Box<dyn Iterator<Item = N> + 'a>>,
}

impl<'a, N: Navigable<'a>> RepeatIter<'a, N> {
    fn new(step: Traversal, start: N) -> Self {
        let mut queue: VecDeque<Box<dyn Iterator<Item = N> + 'a>> = VecDeque::new();
        queue.push_back(Box::new(iter::once(start)));
        Self { step, queue }
    }
}

impl<'a, N: Navigable<'a>> Iterator for RepeatIter<'a, N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        while let Some(front) = self.queue.front_mut() {
            match front.next() {
                Some(node) => {
                    self.queue.push_back(self.step.traverse_ambiguously(&node));
                    return Some(node);
                }
                None => {
                    self.queue.pop_front();
                }
            }
        }
        None
    }
}
