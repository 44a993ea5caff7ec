//! Path segments and concrete paths

use std::fmt;

/// One atomic navigation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// The value bound to a key in a mapping.
    ValueAtKey(String),
    /// The key token itself (hovering a key name).
    KeyAtKey(String),
    /// An element of a sequence (or a document in a multi-document file).
    ValueAtIndex(usize),
    /// Every direct child value.
    AnyChild,
}

impl PathSegment {
    pub fn value_at(key: impl Into<String>) -> Self {
        PathSegment::ValueAtKey(key.into())
    }

    pub fn key_at(key: impl Into<String>) -> Self {
        PathSegment::KeyAtKey(key.into())
    }

    pub fn index(index: usize) -> Self {
        PathSegment::ValueAtIndex(index)
    }

    /// The key this segment refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            PathSegment::ValueAtKey(k) | PathSegment::KeyAtKey(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::ValueAtIndex(i) => Some(*i),
            _ => None,
        }
    }

    /// Rendering used when this segment starts a property-style path.
    pub fn to_prop_string(&self) -> String {
        match self {
            PathSegment::ValueAtKey(k) | PathSegment::KeyAtKey(k) => k.clone(),
            PathSegment::ValueAtIndex(i) => format!("[{i}]"),
            PathSegment::AnyChild => "*".to_string(),
        }
    }

    /// Rendering used when this segment follows another one.
    pub fn to_nav_string(&self) -> String {
        match self {
            PathSegment::ValueAtKey(k) => format!(".{k}"),
            PathSegment::KeyAtKey(k) => format!(".&{k}"),
            PathSegment::ValueAtIndex(i) => format!("[{i}]"),
            PathSegment::AnyChild => ".*".to_string(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_nav_string())
    }
}

/// A plain sequence of segments from some start node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct YamlPath {
    segments: Vec<PathSegment>,
}

impl YamlPath {
    pub const EMPTY: YamlPath = YamlPath {
        segments: Vec::new(),
    };

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Splits a dotted property name into `ValueAtKey` segments.
    pub fn from_property(name: &str) -> Self {
        Self::new(name.split('.').map(PathSegment::value_at).collect())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&PathSegment> {
        self.segments.get(index)
    }

    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn append(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn prepend(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(segment);
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }

    pub fn drop_first(&self, count: usize) -> Self {
        Self::new(self.segments.iter().skip(count).cloned().collect())
    }

    pub fn drop_last(&self) -> Self {
        let keep = self.segments.len().saturating_sub(1);
        Self::new(self.segments[..keep].to_vec())
    }

    pub fn tail(&self) -> Self {
        self.drop_first(1)
    }

    pub fn starts_with(&self, prefix: &YamlPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn common_prefix(&self, other: &YamlPath) -> Self {
        Self::new(
            self.segments
                .iter()
                .zip(other.segments.iter())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a.clone())
                .collect(),
        )
    }

    pub fn points_at_key(&self) -> bool {
        matches!(self.last_segment(), Some(PathSegment::KeyAtKey(_)))
    }

    pub fn points_at_value(&self) -> bool {
        matches!(
            self.last_segment(),
            Some(PathSegment::ValueAtKey(_)) | Some(PathSegment::ValueAtIndex(_))
        )
    }

    /// Name of the bean property the path ends in, if it ends in a key.
    pub fn bean_property_name(&self) -> Option<&str> {
        self.last_segment().and_then(PathSegment::key)
    }

    /// `a.b[2].c` style rendering.
    pub fn to_prop_string(&self) -> String {
        let mut buf = String::new();
        for (i, s) in self.segments.iter().enumerate() {
            if i == 0 {
                buf.push_str(&s.to_prop_string());
            } else {
                buf.push_str(&s.to_nav_string());
            }
        }
        buf
    }

    pub fn to_nav_string(&self) -> String {
        self.segments.iter().map(PathSegment::to_nav_string).collect()
    }
}

impl fmt::Display for YamlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YamlPath({})", self.to_nav_string())
    }
}

impl FromIterator<PathSegment> for YamlPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
