//! Path algebra over navigable trees
//!
//! The same [`YamlPath`] or [`Traversal`] runs over the lenient structure
//! tree, the YAML AST, schema assist contexts and plain `serde_yaml` values,
//! because each of them implements [`Navigable`].

mod segment;
mod traversal;

pub use segment::{PathSegment, YamlPath};
pub use traversal::Traversal;

use serde_yaml::Value;

/// Something a [`PathSegment`] can be applied to.
///
/// A single step may legitimately reach several nodes (an ambiguous schema,
/// duplicate keys, `AnyChild`), so the primitive operation yields an iterator.
pub trait Navigable<'a>: Clone + 'a {
    fn traverse_ambiguously(&self, segment: &PathSegment) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn traverse(&self, segment: &PathSegment) -> Option<Self> {
        self.traverse_ambiguously(segment).next()
    }
}

impl YamlPath {
    /// All nodes reached by following this path from `start`.
    pub fn traverse_ambiguously<'a, N: Navigable<'a>>(
        &self,
        start: &N,
    ) -> Box<dyn Iterator<Item = N> + 'a> {
        Traversal::path(self.clone()).traverse_ambiguously(start)
    }

    pub fn traverse<'a, N: Navigable<'a>>(&self, start: &N) -> Option<N> {
        self.traverse_ambiguously(start).next()
    }
}

impl<'a> Navigable<'a> for &'a Value {
    fn traverse_ambiguously(&self, segment: &PathSegment) -> Box<dyn Iterator<Item = Self> + 'a> {
        let value: &'a Value = *self;
        match segment {
            PathSegment::ValueAtKey(key) => match value.as_mapping() {
                Some(map) => {
                    let key = key.clone();
                    Box::new(
                        map.iter()
                            .filter(move |(k, _)| k.as_str() == Some(key.as_str()))
                            .map(|(_, v)| v),
                    )
                }
                None => Box::new(std::iter::empty()),
            },
            PathSegment::KeyAtKey(key) => match value.as_mapping() {
                Some(map) => {
                    let key = key.clone();
                    Box::new(
                        map.keys()
                            .filter(move |k| k.as_str() == Some(key.as_str())),
                    )
                }
                None => Box::new(std::iter::empty()),
            },
            PathSegment::ValueAtIndex(index) => {
                Box::new(value.as_sequence().and_then(|s| s.get(*index)).into_iter())
            }
            PathSegment::AnyChild => match value {
                Value::Mapping(map) => Box::new(map.values()),
                Value::Sequence(seq) => Box::new(seq.iter()),
                _ => Box::new(std::iter::empty()),
            },
        }
    }
}
