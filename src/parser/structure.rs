//! Lenient block-indentation parser
//!
//! Builds a tree from indentation and the `key:` / `- ` block markers only,
//! without requiring the text to be valid YAML. It is the fallback structure
//! for content assist while the user is typing, and for regions the real
//! YAML parser rejects.
//!
//! Parsing never fails: the root always spans the whole text.

use std::fmt::Write as _;

use lazy_static::lazy_static;
use regex::Regex;

use crate::names::relaxed_eq;
use crate::path::{Navigable, PathSegment, YamlPath};
use crate::text::Region;

lazy_static! {
    /// `key:` or `key: value` with a simple (property-like) key.
    static ref SIMPLE_KEY_LINE: Regex = Regex::new(r"^(\w(?:\.|\w|-)*):(?: .*)?$").unwrap();
    /// `- ` or a lone `-`.
    static ref SEQ_LINE: Regex = Regex::new(r"^-(?: .*)?$").unwrap();
    /// `---` or `...`, optionally followed by a comment.
    static ref DOCUMENT_SEPARATOR: Regex = Regex::new(r"^(?:---|\.\.\.)\s*(?:#.*)?$").unwrap();
    /// Comments and directives that may precede the first document.
    static ref SKIP_AT_START: Regex = Regex::new(r"^(?:\s*#|%)").unwrap();
}

/// Index of a node in its [`StructureTree`].
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SNodeKind {
    Root,
    Document,
    Key,
    Seq,
    Raw,
}

impl SNodeKind {
    fn label(self) -> &'static str {
        match self {
            SNodeKind::Root => "ROOT",
            SNodeKind::Document => "DOC",
            SNodeKind::Key => "KEY",
            SNodeKind::Seq => "SEQ",
            SNodeKind::Raw => "RAW",
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: SNodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// `None` for whitespace-only lines.
    indent: Option<usize>,
    start: usize,
    /// Own end, including the line terminator.
    end: usize,
    /// End of the line content, excluding the terminator.
    content_end: usize,
    /// Document index or sequence item index.
    index: usize,
    colon: Option<usize>,
    seq_children: usize,
}

/// One physical line. `indent` counts leading spaces.
#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    content_end: usize,
    end: usize,
    indent: Option<usize>,
}

impl Line {
    fn text<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.content_end]
    }

    fn text_without_indent<'t>(&self, text: &'t str) -> &'t str {
        let from = (self.start + self.indent.unwrap_or(0)).min(self.content_end);
        &text[from..self.content_end]
    }

    fn matches(&self, text: &str, pattern: &Regex) -> bool {
        pattern.is_match(self.text_without_indent(text))
    }

    fn move_indent_mark(&self, by: usize) -> Line {
        let length = self.content_end - self.start;
        Line {
            indent: self.indent.map(|i| (i + by).min(length)),
            ..*self
        }
    }
}

fn split_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    loop {
        let (content_end, end) = match text[start..].find('\n') {
            Some(nl) => {
                let nl = start + nl;
                let content_end = if nl > start && text.as_bytes()[nl - 1] == b'\r' {
                    nl - 1
                } else {
                    nl
                };
                (content_end, nl + 1)
            }
            None => (text.len(), text.len()),
        };
        let content = &text[start..content_end];
        let spaces = content.bytes().take_while(|b| *b == b' ').count();
        let indent = if content.trim().is_empty() {
            None
        } else {
            Some(spaces)
        };
        lines.push(Line {
            start,
            content_end,
            end,
            indent,
        });
        if end >= text.len() && content_end == end {
            break;
        }
        start = end;
    }
    lines
}

/// Arena holding the lenient structure of one document snapshot.
#[derive(Debug, Clone)]
pub struct StructureTree {
    text: String,
    nodes: Vec<NodeData>,
    relaxed_names: bool,
}

impl StructureTree {
    /// Parses `text`. Key lookups are exact.
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, false)
    }

    /// Parses `text`; with `relaxed_names` key lookups bind `fooBar` to `foo-bar`.
    pub fn parse_with(text: &str, relaxed_names: bool) -> Self {
        let mut tree = StructureTree {
            text: text.to_string(),
            nodes: vec![NodeData {
                kind: SNodeKind::Root,
                parent: None,
                children: Vec::new(),
                indent: Some(0),
                start: 0,
                end: text.len(),
                content_end: text.len(),
                index: 0,
                colon: None,
                seq_children: 0,
            }],
            relaxed_names,
        };
        tree.build();
        tree
    }

    fn build(&mut self) {
        let text = self.text.clone();
        let lines = split_lines(&text);
        let mut pending = lines.iter().peekable();

        let mut leading = Vec::new();
        while let Some(line) = pending.peek() {
            if line.indent.is_some() && SKIP_AT_START.is_match(line.text(&text)) {
                leading.push(**line);
                pending.next();
            } else {
                break;
            }
        }

        let mut parent = 0;
        let starts_with_separator = pending
            .peek()
            .map_or(false, |line| line.matches(&text, &DOCUMENT_SEPARATOR));
        if !starts_with_separator {
            parent = self.add_document(0, 0, 0);
            for line in &leading {
                self.add_raw(parent, line);
            }
        }

        for line in pending {
            if line.indent.is_none() {
                self.add_raw(parent, line);
            } else {
                parent = self.parse_line(&text, parent, *line, true);
            }
        }
    }

    fn parse_line(&mut self, text: &str, parent: NodeId, line: Line, top_level: bool) -> NodeId {
        let indent = line.indent.unwrap_or(0);
        if top_level && line.matches(text, &DOCUMENT_SEPARATOR) {
            self.add_document(line.start, line.content_end, line.end)
        } else if line.matches(text, &SIMPLE_KEY_LINE) {
            let parent = self.drop_to_level(parent, |node| node.indent.map_or(false, |i| i < indent));
            let colon = line.text_without_indent(text).find(':').unwrap_or(0);
            self.add_node(parent, SNodeKind::Key, &line, Some(line.start + indent + colon))
        } else if line.matches(text, &SEQ_LINE) {
            let parent = self.drop_to_level(parent, |node| {
                let node_indent = node.indent.unwrap_or(0);
                node_indent < indent || (node.kind != SNodeKind::Seq && node_indent <= indent)
            });
            let item = self.add_node(parent, SNodeKind::Seq, &line, None);
            // the text after "- " may itself open a key or a nested item
            self.parse_line(text, item, line.move_indent_mark(2), false)
        } else {
            if top_level {
                self.add_raw(parent, &line);
            }
            parent
        }
    }

    fn drop_to_level(&self, mut parent: NodeId, level: impl Fn(&NodeData) -> bool) -> NodeId {
        loop {
            let node = &self.nodes[parent];
            let is_step = matches!(node.kind, SNodeKind::Key | SNodeKind::Seq);
            if !is_step || level(node) {
                return parent;
            }
            match node.parent {
                Some(up) => parent = up,
                None => return parent,
            }
        }
    }

    fn push(&mut self, parent: NodeId, mut data: NodeData) -> NodeId {
        let id = self.nodes.len();
        data.parent = Some(parent);
        if data.kind == SNodeKind::Seq {
            self.nodes[parent].seq_children += 1;
            data.index = self.nodes[parent].seq_children - 1;
        } else if data.kind == SNodeKind::Document {
            data.index = self.nodes[parent].children.len();
        }
        self.nodes[parent].children.push(id);
        self.nodes.push(data);
        id
    }

    fn add_document(&mut self, start: usize, content_end: usize, end: usize) -> NodeId {
        self.push(
            0,
            NodeData {
                kind: SNodeKind::Document,
                parent: None,
                children: Vec::new(),
                indent: Some(0),
                start,
                end,
                content_end,
                index: 0,
                colon: None,
                seq_children: 0,
            },
        )
    }

    fn add_node(&mut self, parent: NodeId, kind: SNodeKind, line: &Line, colon: Option<usize>) -> NodeId {
        let indent = line.indent.unwrap_or(0);
        self.push(
            parent,
            NodeData {
                kind,
                parent: None,
                children: Vec::new(),
                indent: Some(indent),
                start: line.start + indent,
                end: line.end,
                content_end: line.content_end,
                index: 0,
                colon,
                seq_children: 0,
            },
        )
    }

    fn add_raw(&mut self, parent: NodeId, line: &Line) -> NodeId {
        self.push(
            parent,
            NodeData {
                kind: SNodeKind::Raw,
                parent: None,
                children: Vec::new(),
                indent: line.indent,
                start: line.start + line.indent.unwrap_or(0),
                end: line.end,
                content_end: line.content_end,
                index: 0,
                colon: None,
                seq_children: 0,
            },
        )
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> SNode<'_> {
        SNode { tree: self, id: 0 }
    }

    pub fn node(&self, id: NodeId) -> Option<SNode<'_>> {
        (id < self.nodes.len()).then_some(SNode { tree: self, id })
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Deepest node whose tree range contains `offset`.
    ///
    /// Ranges are half-open. An offset equal to the text length (a cursor
    /// after the last character) belongs to the last node ending there.
    pub fn find(&self, offset: usize) -> Option<SNode<'_>> {
        self.root().find(offset)
    }

    /// Indented rendering of the tree, one node per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.root().dump_into(&mut out, 0);
        out
    }
}

/// A borrowed handle on one node of a [`StructureTree`].
#[derive(Clone, Copy)]
pub struct SNode<'a> {
    tree: &'a StructureTree,
    id: NodeId,
}

impl PartialEq for SNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for SNode<'_> {}

impl std::fmt::Debug for SNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}): {:?}",
            self.kind().label(),
            self.id,
            self.text()
        )
    }
}

impl<'a> SNode<'a> {
    fn data(&self) -> &'a NodeData {
        &self.tree.nodes[self.id]
    }

    fn at(&self, id: NodeId) -> SNode<'a> {
        SNode { tree: self.tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a StructureTree {
        self.tree
    }

    pub fn kind(&self) -> SNodeKind {
        self.data().kind
    }

    pub fn parent(&self) -> Option<SNode<'a>> {
        self.data().parent.map(|id| self.at(id))
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = SNode<'a>> + 'a {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&id| SNode { tree, id })
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn last_child(&self) -> Option<SNode<'a>> {
        self.data().children.last().map(|&id| self.at(id))
    }

    /// Indentation in spaces; `None` for blank lines.
    pub fn indent(&self) -> Option<usize> {
        self.data().indent
    }

    pub fn start(&self) -> usize {
        self.data().start
    }

    /// End of the node's own line(s), terminator included.
    pub fn node_end(&self) -> usize {
        self.data().end
    }

    /// End of the node together with all of its descendants.
    pub fn tree_end(&self) -> usize {
        if self.kind() == SNodeKind::Root {
            return self.data().end;
        }
        let mut node = *self;
        while let Some(last) = node.last_child() {
            node = last;
        }
        node.node_end().max(self.node_end())
    }

    pub fn region(&self) -> Region {
        Region::new(self.start(), self.node_end())
    }

    pub fn tree_region(&self) -> Region {
        Region::new(self.start(), self.tree_end())
    }

    /// Half-open containment over the tree range.
    pub fn contains(&self, offset: usize) -> bool {
        self.tree_region().contains(offset)
    }

    /// The node's own line text, without indentation or terminator.
    pub fn text(&self) -> &'a str {
        let data = self.data();
        let end = data.content_end.max(data.start);
        &self.tree.text[data.start..end]
    }

    /// Text of the whole subtree, terminator of the last line excluded.
    pub fn tree_text(&self) -> &'a str {
        let end = self.tree_end();
        self.tree.text[self.start()..end].trim_end_matches(['\n', '\r'])
    }

    /// Document index for documents, item index for sequence items.
    pub fn index(&self) -> usize {
        self.data().index
    }

    pub fn colon_offset(&self) -> Option<usize> {
        self.data().colon
    }

    /// Key text of a key node.
    pub fn key(&self) -> Option<&'a str> {
        let colon = self.colon_offset()?;
        self.tree.text.get(self.start()..colon)
    }

    pub fn key_region(&self) -> Option<Region> {
        self.colon_offset().map(|colon| Region::new(self.start(), colon))
    }

    /// Inline value text after the colon of a key node, trimmed.
    pub fn simple_value(&self) -> Option<&'a str> {
        let colon = self.colon_offset()?;
        let data = self.data();
        self.tree
            .text
            .get(colon + 1..data.content_end.max(colon + 1))
            .map(str::trim)
    }

    /// The offset is in the key part of a key node (colon included).
    pub fn is_in_key(&self, offset: usize) -> bool {
        match self.colon_offset() {
            Some(colon) => self.start() <= offset && offset <= colon,
            None => false,
        }
    }

    /// The offset is in the value part of a key node or sequence item.
    pub fn is_in_value(&self, offset: usize) -> bool {
        match self.kind() {
            SNodeKind::Key => self
                .colon_offset()
                .map_or(false, |colon| offset > colon && offset <= self.tree_end()),
            SNodeKind::Seq => {
                let dash = if self.text().len() == 1 { 1 } else { 2 };
                offset >= self.start() + dash && offset <= self.tree_end()
            }
            _ => false,
        }
    }

    /// The path segment this node contributes, if it is a navigation step.
    pub fn segment(&self) -> Option<PathSegment> {
        match self.kind() {
            SNodeKind::Key => self.key().map(PathSegment::value_at),
            SNodeKind::Seq | SNodeKind::Document => Some(PathSegment::index(self.index())),
            SNodeKind::Root | SNodeKind::Raw => None,
        }
    }

    /// Ancestors from the root down to this node, inclusive.
    pub fn path_nodes(&self) -> Vec<SNode<'a>> {
        let mut nodes = vec![*self];
        let mut current = *self;
        while let Some(parent) = current.parent() {
            nodes.push(parent);
            current = parent;
        }
        nodes.reverse();
        nodes
    }

    /// Path from the root: document index, then keys and item indices.
    pub fn path(&self) -> YamlPath {
        self.path_nodes().iter().filter_map(SNode::segment).collect()
    }

    pub fn document(&self) -> Option<SNode<'a>> {
        self.path_nodes()
            .into_iter()
            .find(|n| n.kind() == SNodeKind::Document)
    }

    /// Deepest node in this subtree containing `offset`.
    pub fn find(&self, offset: usize) -> Option<SNode<'a>> {
        let at_eof = offset == self.tree.text.len();
        self.find_inner(offset, at_eof)
    }

    fn find_inner(&self, offset: usize, at_eof: bool) -> Option<SNode<'a>> {
        let contains = self.start() <= offset
            && (offset < self.tree_end() || (at_eof && offset == self.tree_end()));
        if !contains {
            return None;
        }
        if at_eof {
            // the cursor after the last character sits on the last line
            for child in self.children().rev() {
                if let Some(found) = child.find_inner(offset, at_eof) {
                    return Some(found);
                }
            }
        } else {
            for child in self.children() {
                if let Some(found) = child.find_inner(offset, at_eof) {
                    return Some(found);
                }
            }
        }
        Some(*self)
    }

    /// Key children named `key`. Relaxed trees also match other spellings.
    pub fn children_with_key(&self, key: &str) -> impl Iterator<Item = SNode<'a>> + 'a {
        let key = key.to_string();
        let relaxed = self.tree.relaxed_names;
        self.children().filter(move |child| match child.key() {
            Some(k) if relaxed => relaxed_eq(k, &key),
            Some(k) => k == key,
            None => false,
        })
    }

    pub fn child_with_key(&self, key: &str) -> Option<SNode<'a>> {
        self.children_with_key(key).next()
    }

    pub fn seq_child(&self, index: usize) -> Option<SNode<'a>> {
        self.children()
            .find(|c| c.kind() == SNodeKind::Seq && c.index() == index)
    }

    /// Keys of the direct key children, in order.
    pub fn child_keys(&self) -> Vec<&'a str> {
        self.children().filter_map(|c| c.key()).collect()
    }

    /// Last child that is not a blank line.
    pub fn last_real_child(&self) -> Option<SNode<'a>> {
        self.children().rev().find(|c| c.indent().is_some())
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let indent = self
            .indent()
            .map_or_else(|| "-1".to_string(), |i| i.to_string());
        let text = if self.kind() == SNodeKind::Root {
            ""
        } else {
            self.text()
        };
        let _ = writeln!(
            out,
            "{}{}({}): {}",
            "  ".repeat(depth),
            self.kind().label(),
            indent,
            text
        );
        for child in self.children() {
            child.dump_into(out, depth + 1);
        }
    }
}

impl<'a> Navigable<'a> for SNode<'a> {
    fn traverse_ambiguously(&self, segment: &PathSegment) -> Box<dyn Iterator<Item = Self> + 'a> {
        match (self.kind(), segment) {
            (SNodeKind::Raw, _) => Box::new(std::iter::empty()),
            (SNodeKind::Root, PathSegment::ValueAtIndex(index)) => {
                Box::new(self.children().nth(*index).into_iter())
            }
            (SNodeKind::Root, _) => Box::new(std::iter::empty()),
            (_, PathSegment::ValueAtKey(key)) => Box::new(self.children_with_key(key)),
            (_, PathSegment::ValueAtIndex(index)) => Box::new(self.seq_child(*index).into_iter()),
            (_, PathSegment::AnyChild) => Box::new(
                self.children()
                    .filter(|c| matches!(c.kind(), SNodeKind::Key | SNodeKind::Seq)),
            ),
            (_, PathSegment::KeyAtKey(_)) => Box::new(std::iter::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_structure() {
        let tree = StructureTree::parse("hello:\n  world:\n    message\n");
        assert_eq!(
            tree.dump(),
            "ROOT(0): \n  DOC(0): \n    KEY(0): hello:\n      KEY(2): world:\n        RAW(4): message\n        RAW(-1): \n"
        );
    }

    #[test]
    fn test_sequences() {
        let text = "foo:\n- a: 1\n  b: 2\n- c\nbar: x\n";
        let tree = StructureTree::parse(text);
        assert_eq!(
            tree.dump(),
            concat!(
                "ROOT(0): \n",
                "  DOC(0): \n",
                "    KEY(0): foo:\n",
                "      SEQ(0): - a: 1\n",
                "        KEY(2): a: 1\n",
                "        KEY(2): b: 2\n",
                "      SEQ(0): - c\n",
                "    KEY(0): bar: x\n",
                "      RAW(-1): \n",
            )
        );
        let foo = tree.root().children().next().unwrap().children().next().unwrap();
        let items: Vec<_> = foo.children().map(|c| c.index()).collect();
        assert_eq!(items, vec![0, 1]);
    }

    #[test]
    fn test_documents() {
        let text = "# comment\n---\na: 1\n---\nb: 2";
        let tree = StructureTree::parse(text);
        let docs: Vec<_> = tree.root().children().collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].index(), 0);
        assert_eq!(docs[1].index(), 1);
        assert_eq!(docs[1].child_keys(), vec!["b"]);
    }

    #[test]
    fn test_leading_comment_belongs_to_implicit_document() {
        let tree = StructureTree::parse("# just a comment");
        let doc = tree.root().children().next().unwrap();
        assert_eq!(doc.kind(), SNodeKind::Document);
        assert_eq!(doc.child_count(), 1);
    }

    #[test]
    fn test_empty_text() {
        let tree = StructureTree::parse("");
        assert_eq!(tree.root().region(), Region::new(0, 0));
        let found = tree.find(0).unwrap();
        assert_eq!(found.path(), YamlPath::new(vec![PathSegment::index(0)]));
    }

    #[test]
    fn test_find_and_path() {
        let text = "server:\n  port: 8080\n  ssl:\n    enabled: true\n";
        let tree = StructureTree::parse(text);
        let offset = text.find("enabled").unwrap() + 2;
        let node = tree.find(offset).unwrap();
        assert_eq!(node.key(), Some("enabled"));
        assert_eq!(node.path().to_prop_string(), "[0].server.ssl.enabled");
        assert!(node.is_in_key(offset));
        assert!(!node.is_in_value(offset));

        let port = tree.find(text.find("8080").unwrap()).unwrap();
        assert_eq!(port.key(), Some("port"));
        assert_eq!(port.simple_value(), Some("8080"));
        assert!(port.is_in_value(text.find("8080").unwrap()));
    }

    #[test]
    fn test_boundary_belongs_to_next_sibling() {
        let text = "a: 1\nb: 2\n";
        let tree = StructureTree::parse(text);
        let a = tree.find(0).unwrap();
        let b = tree.find(5).unwrap();
        assert_eq!(a.key(), Some("a"));
        assert_eq!(b.key(), Some("b"));
        assert!(!a.contains(5));
        assert!(b.contains(5));
    }

    #[test]
    fn test_cursor_at_end_of_text() {
        let text = "server:\n  po";
        let tree = StructureTree::parse(text);
        let node = tree.find(text.len()).unwrap();
        assert_eq!(node.kind(), SNodeKind::Raw);
        assert_eq!(node.parent().unwrap().key(), Some("server"));
    }

    #[test]
    fn test_navigation() {
        let text = "foo:\n  bar:\n  - x: 1\n  - x: 2\n";
        let tree = StructureTree::parse(text);
        let path = YamlPath::new(vec![
            PathSegment::index(0),
            PathSegment::value_at("foo"),
            PathSegment::value_at("bar"),
        ]);
        let bar = path.traverse(&tree.root()).unwrap();
        assert_eq!(bar.key(), Some("bar"));
        let xs: Vec<_> = crate::path::Traversal::path(path)
            .then_segment(PathSegment::AnyChild)
            .then_segment(PathSegment::value_at("x"))
            .traverse_ambiguously(&tree.root())
            .map(|n| n.simple_value().unwrap_or_default().to_string())
            .collect();
        assert_eq!(xs, vec!["1", "2"]);
    }

    #[test]
    fn test_relaxed_key_lookup() {
        let text = "max-retries: 3\n";
        let exact = StructureTree::parse(text);
        let relaxed = StructureTree::parse_with(text, true);
        let binds = |t: &StructureTree| {
            t.root()
                .children()
                .next()
                .unwrap()
                .child_with_key("maxRetries")
                .is_some()
        };
        assert!(!binds(&exact));
        assert!(binds(&relaxed));
    }

    #[test]
    fn test_invalid_yaml_still_structured() {
        let text = "a:\n  b: [unclosed\n   : weird\n\tc: tab\n";
        let tree = StructureTree::parse(text);
        assert_eq!(tree.root().tree_region(), Region::new(0, text.len()));
        let b = tree.find(text.find("unclosed").unwrap()).unwrap();
        assert_eq!(b.key(), Some("b"));
    }
}
