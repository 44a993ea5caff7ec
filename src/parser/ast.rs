//! YAML AST correlated with byte offsets
//!
//! Runs `saphyr-parser` over the text and turns its event stream into owned
//! [`AstNode`] trees, one per document. Anchors and tags are ignored and
//! aliases are kept as plain scalars.
//!
//! A syntax error does not discard the whole document. The smallest
//! structural block (from the lenient [`StructureTree`]) whose removal lets
//! the parse go through is blanked out, offsets preserved, and parsing is
//! retried. Blanked blocks are reported as [`DamagedRegion`]s so callers can
//! fall back to the structure tree there.

use saphyr_parser::{Event, Parser, ScalarStyle, Span};
use tracing::debug;

use crate::path::{Navigable, PathSegment, YamlPath};
use crate::text::{floor_char_boundary, Region};

use super::structure::{NodeId, SNode, SNodeKind, StructureTree};

/// A YAML node with its source region.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: AstKind,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    Scalar(String),
    Mapping(Vec<AstEntry>),
    Sequence(Vec<AstNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AstEntry {
    pub key: AstNode,
    pub value: AstNode,
}

impl AstEntry {
    /// The key as text, when it is a scalar.
    pub fn key_text(&self) -> Option<&str> {
        self.key.as_scalar()
    }
}

impl AstNode {
    fn scalar(value: impl Into<String>, region: Region) -> Self {
        AstNode {
            kind: AstKind::Scalar(value.into()),
            region,
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.region.contains(offset)
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match &self.kind {
            AstKind::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[AstEntry]> {
        match &self.kind {
            AstKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[AstNode]> {
        match &self.kind {
            AstKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, AstKind::Scalar(_))
    }

    /// An empty or implicit-null scalar.
    pub fn is_empty_scalar(&self) -> bool {
        self.as_scalar().map_or(false, |v| v.trim().is_empty())
    }

    /// Entries whose key is `key`.
    pub fn entries_with_key<'s>(&'s self, key: &'s str) -> impl Iterator<Item = &'s AstEntry> + 's {
        self.as_mapping()
            .unwrap_or_default()
            .iter()
            .filter(move |e| e.key_text() == Some(key))
    }

    /// Value of the first entry whose key is `key`.
    pub fn get(&self, key: &str) -> Option<&AstNode> {
        self.as_mapping()?
            .iter()
            .find(|e| e.key_text() == Some(key))
            .map(|e| &e.value)
    }

    /// Scalar keys of a mapping, in order.
    pub fn key_names(&self) -> Vec<&str> {
        self.as_mapping()
            .unwrap_or_default()
            .iter()
            .filter_map(AstEntry::key_text)
            .collect()
    }

    /// Short description of the node kind, for messages.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            AstKind::Scalar(_) => "scalar",
            AstKind::Mapping(_) => "mapping",
            AstKind::Sequence(_) => "sequence",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AstDocument {
    pub index: usize,
    pub root: AstNode,
}

/// A syntax error reported by the YAML scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub region: Region,
}

/// A structural block that had to be removed for the text to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct DamagedRegion {
    pub region: Region,
    /// The blanked block in the structure tree.
    pub block: NodeId,
    /// Structure path of the block's parent, document index first.
    pub parent_path: YamlPath,
    /// Key text and key region when the block is a `key:` block.
    pub key: Option<(String, Region)>,
}

/// Parse result for one document snapshot.
#[derive(Debug, Clone)]
pub struct YamlAst {
    documents: Vec<AstDocument>,
    syntax_errors: Vec<SyntaxError>,
    damaged: Vec<DamagedRegion>,
    structure: StructureTree,
}

impl YamlAst {
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, StructureTree::parse(text))
    }

    /// Parses `text`, isolating failures to blocks of `structure`.
    pub fn parse_with(text: &str, structure: StructureTree) -> Self {
        let mut working = text.to_string();
        let mut syntax_errors = Vec::new();
        let mut damaged: Vec<DamagedRegion> = Vec::new();
        let mut documents = Vec::new();

        // every round blanks a new block, so the tree size bounds the rounds
        for _ in 0..structure.len() + 2 {
            let failure = match scan(&working) {
                Ok(events) => {
                    documents = build_documents(&events, &working, text);
                    break;
                }
                Err(failure) => failure,
            };
            debug!("YAML scan error at {}: {}", failure.offset, failure.message);
            let start = floor_char_boundary(text, failure.offset);
            let end = text[start..]
                .chars()
                .next()
                .map_or(start, |c| start + c.len_utf8());
            syntax_errors.push(SyntaxError {
                message: failure.message.clone(),
                region: Region::new(start, end),
            });

            let Some(isolated) = isolate(&structure, &working, &failure) else {
                debug!("Could not isolate YAML error, giving up on the AST");
                break;
            };
            debug!("Blanked damaged block {}", isolated.region);
            if let Some(block) = structure.node(isolated.block) {
                damaged.retain(|d| !isolated.region.encloses(&d.region));
                damaged.push(damaged_region(block, isolated.region));
            }
            working = isolated.text;
        }

        damaged.sort_by_key(|d| d.region);
        YamlAst {
            documents,
            syntax_errors,
            damaged,
            structure,
        }
    }

    pub fn documents(&self) -> &[AstDocument] {
        &self.documents
    }

    pub fn document(&self, index: usize) -> Option<&AstDocument> {
        self.documents.get(index)
    }

    pub fn syntax_errors(&self) -> &[SyntaxError] {
        &self.syntax_errors
    }

    pub fn damaged_regions(&self) -> &[DamagedRegion] {
        &self.damaged
    }

    pub fn structure(&self) -> &StructureTree {
        &self.structure
    }

    /// Whether `offset` lies in a block the YAML parser could not handle.
    pub fn is_damaged(&self, offset: usize) -> bool {
        self.damaged.iter().any(|d| d.region.contains(offset))
    }

    /// Ancestors of the deepest node containing `offset`, outermost first.
    pub fn find_path(&self, offset: usize) -> Vec<&AstNode> {
        let mut nodes = Vec::new();
        let Some(doc) = self.documents.iter().find(|d| d.root.contains(offset)) else {
            return nodes;
        };
        let mut current = &doc.root;
        nodes.push(current);
        while let Some(child) = child_containing(current, offset) {
            nodes.push(child);
            current = child;
        }
        nodes
    }

    pub fn find_node(&self, offset: usize) -> Option<&AstNode> {
        self.find_path(offset).last().copied()
    }

    /// Path of the deepest node at `offset`. On a mapping key the path ends
    /// with a `KeyAtKey` segment and the key node is returned.
    pub fn path_at(&self, offset: usize) -> Option<(YamlPath, &AstNode)> {
        let doc = self.documents.iter().find(|d| d.root.contains(offset))?;
        let mut path = YamlPath::new(vec![PathSegment::index(doc.index)]);
        let mut current = &doc.root;
        loop {
            match &current.kind {
                AstKind::Mapping(entries) => {
                    let mut next = None;
                    for entry in entries {
                        let key = entry.key_text().unwrap_or_default();
                        if entry.key.contains(offset) {
                            return Some((path.append(PathSegment::key_at(key)), &entry.key));
                        }
                        if entry.value.contains(offset) {
                            next = Some((PathSegment::value_at(key), &entry.value));
                            break;
                        }
                    }
                    match next {
                        Some((segment, node)) => {
                            path = path.append(segment);
                            current = node;
                        }
                        None => return Some((path, current)),
                    }
                }
                AstKind::Sequence(items) => {
                    match items.iter().enumerate().find(|(_, item)| item.contains(offset)) {
                        Some((index, item)) => {
                            path = path.append(PathSegment::index(index));
                            current = item;
                        }
                        None => return Some((path, current)),
                    }
                }
                AstKind::Scalar(_) => return Some((path, current)),
            }
        }
    }
}

fn child_containing(node: &AstNode, offset: usize) -> Option<&AstNode> {
    match &node.kind {
        AstKind::Mapping(entries) => entries.iter().find_map(|e| {
            if e.key.contains(offset) {
                Some(&e.key)
            } else if e.value.contains(offset) {
                Some(&e.value)
            } else {
                None
            }
        }),
        AstKind::Sequence(items) => items.iter().find(|i| i.contains(offset)),
        AstKind::Scalar(_) => None,
    }
}

/// A position in the AST that paths can be applied to.
#[derive(Debug, Clone, Copy)]
pub enum AstRef<'a> {
    File(&'a YamlAst),
    Node(&'a AstNode),
}

impl<'a> AstRef<'a> {
    pub fn node(&self) -> Option<&'a AstNode> {
        match self {
            AstRef::File(_) => None,
            AstRef::Node(node) => Some(node),
        }
    }
}

impl<'a> Navigable<'a> for AstRef<'a> {
    fn traverse_ambiguously(&self, segment: &PathSegment) -> Box<dyn Iterator<Item = Self> + 'a> {
        match (*self, segment) {
            (AstRef::File(ast), PathSegment::ValueAtIndex(index)) => Box::new(
                ast.documents
                    .get(*index)
                    .map(|d| AstRef::Node(&d.root))
                    .into_iter(),
            ),
            (AstRef::File(_), _) => Box::new(std::iter::empty()),
            (AstRef::Node(node), PathSegment::ValueAtKey(key)) => {
                let key = key.clone();
                Box::new(
                    node.as_mapping()
                        .unwrap_or_default()
                        .iter()
                        .filter(move |e| e.key_text() == Some(key.as_str()))
                        .map(|e| AstRef::Node(&e.value)),
                )
            }
            (AstRef::Node(node), PathSegment::KeyAtKey(key)) => {
                let key = key.clone();
                Box::new(
                    node.as_mapping()
                        .unwrap_or_default()
                        .iter()
                        .filter(move |e| e.key_text() == Some(key.as_str()))
                        .map(|e| AstRef::Node(&e.key)),
                )
            }
            (AstRef::Node(node), PathSegment::ValueAtIndex(index)) => Box::new(
                node.as_sequence()
                    .and_then(|items| items.get(*index))
                    .map(AstRef::Node)
                    .into_iter(),
            ),
            (AstRef::Node(node), PathSegment::AnyChild) => match &node.kind {
                AstKind::Mapping(entries) => {
                    Box::new(entries.iter().map(|e| AstRef::Node(&e.value)))
                }
                AstKind::Sequence(items) => Box::new(items.iter().map(AstRef::Node)),
                AstKind::Scalar(_) => Box::new(std::iter::empty()),
            },
        }
    }
}

struct ScanFailure {
    offset: usize,
    message: String,
    /// Start of the innermost collection still open when scanning failed.
    open_start: Option<usize>,
}

type Events<'t> = Vec<(Event<'t>, Span)>;

fn char_to_byte(text: &str) -> Vec<usize> {
    let mut table: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    table.push(text.len());
    table
}

fn scan(text: &str) -> Result<Events<'_>, ScanFailure> {
    let to_byte = char_to_byte(text);
    let byte = |index: usize| to_byte.get(index).copied().unwrap_or(text.len());
    let mut events = Vec::new();
    let mut open = Vec::new();
    for result in Parser::new_from_str(text) {
        match result {
            Ok((event, span)) => {
                match &event {
                    Event::SequenceStart(..) | Event::MappingStart(..) => {
                        open.push(byte(span.start.index()))
                    }
                    Event::SequenceEnd | Event::MappingEnd => {
                        open.pop();
                    }
                    _ => {}
                }
                events.push((event, span));
            }
            Err(error) => {
                return Err(ScanFailure {
                    offset: byte(error.marker().index()),
                    message: error.info().to_string(),
                    open_start: open.last().copied(),
                })
            }
        }
    }
    Ok(events)
}

struct Isolated {
    block: NodeId,
    region: Region,
    text: String,
}

fn push_unique<'a>(candidates: &mut Vec<SNode<'a>>, node: Option<SNode<'a>>) {
    if let Some(node) = node {
        if !candidates.contains(&node) {
            candidates.push(node);
        }
    }
}

/// Picks the block to blank for `failure`.
///
/// Candidates, in order: the block at the error, the block before it, the
/// block of the innermost open collection and its ancestors, then the whole
/// document. The first candidate whose removal makes the text parse wins;
/// failing that, the first one that moves the error forward.
fn isolate(structure: &StructureTree, working: &str, failure: &ScanFailure) -> Option<Isolated> {
    let mut candidates = Vec::new();

    let at_error = structure
        .find(failure.offset)
        .or_else(|| structure.find(working.len()));
    push_unique(&mut candidates, at_error.and_then(step_block));
    let before = working[..failure.offset.min(working.len())]
        .trim_end()
        .len()
        .checked_sub(1)
        .and_then(|o| structure.find(o));
    push_unique(&mut candidates, before.and_then(step_block));
    let open = failure
        .open_start
        .and_then(|o| structure.find(o))
        .and_then(step_block);
    push_unique(&mut candidates, open);
    for seed in [open, at_error.and_then(step_block)] {
        let mut node = seed.and_then(|n| n.parent());
        while let Some(n) = node {
            if matches!(n.kind(), SNodeKind::Key | SNodeKind::Seq) {
                push_unique(&mut candidates, Some(n));
            }
            node = n.parent();
        }
    }
    push_unique(&mut candidates, at_error.and_then(|n| n.document()));

    let mut progress: Option<Isolated> = None;
    for candidate in candidates {
        let region = blank_region(candidate);
        if region.is_empty() {
            continue;
        }
        let text = blank(working, region);
        if text == working {
            continue;
        }
        let moved_on = match scan(&text) {
            Ok(_) => {
                return Some(Isolated {
                    block: candidate.id(),
                    region,
                    text,
                })
            }
            Err(next) => next.offset > failure.offset,
        };
        if moved_on && progress.is_none() {
            progress = Some(Isolated {
                block: candidate.id(),
                region,
                text,
            });
        }
    }
    progress
}

fn step_block(node: SNode<'_>) -> Option<SNode<'_>> {
    let mut current = Some(node);
    while let Some(n) = current {
        if matches!(n.kind(), SNodeKind::Key | SNodeKind::Seq) {
            return Some(n);
        }
        if matches!(n.kind(), SNodeKind::Document | SNodeKind::Root) {
            return None;
        }
        current = n.parent();
    }
    None
}

fn blank_region(block: SNode<'_>) -> Region {
    match block.kind() {
        // keep the `---` line so documents stay apart
        SNodeKind::Document => Region::new(block.node_end().min(block.tree_end()), block.tree_end()),
        _ => block.tree_region(),
    }
}

/// Replaces every non-newline byte of `region` by a space.
fn blank(text: &str, region: Region) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..region.start]);
    for c in text[region.start..region.end].chars() {
        if c == '\n' || c == '\r' {
            out.push(c);
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    }
    out.push_str(&text[region.end..]);
    out
}

fn damaged_region(block: SNode<'_>, region: Region) -> DamagedRegion {
    let parent_path = block.parent().map(|p| p.path()).unwrap_or_default();
    let key = block
        .key()
        .zip(block.key_region())
        .map(|(k, r)| (k.to_string(), r));
    DamagedRegion {
        region,
        block: block.id(),
        parent_path,
        key,
    }
}

/// `text` is the scanned (possibly blanked) text; regions are snapped to
/// char boundaries of `original`, which has the same length.
fn build_documents(events: &[(Event<'_>, Span)], text: &str, original: &str) -> Vec<AstDocument> {
    let mut builder = Builder {
        events,
        pos: 0,
        text,
        original,
        to_byte: char_to_byte(text),
        last_end: 0,
    };
    let mut documents = Vec::new();
    while builder.pos < events.len() {
        let (event, span) = &events[builder.pos];
        builder.pos += 1;
        if let Event::DocumentStart(_) = event {
            let start = builder.byte(span.start.index());
            builder.last_end = start;
            let root = builder
                .node()
                .unwrap_or_else(|| AstNode::scalar("", Region::empty(start)));
            while builder.pos < events.len() {
                let done = matches!(events[builder.pos].0, Event::DocumentEnd);
                builder.pos += 1;
                if done {
                    break;
                }
            }
            documents.push(AstDocument {
                index: documents.len(),
                root,
            });
        }
    }
    documents
}

struct Builder<'e, 't> {
    events: &'e [(Event<'t>, Span)],
    pos: usize,
    text: &'e str,
    original: &'e str,
    to_byte: Vec<usize>,
    /// End of the last token consumed; implicit nulls are placed here.
    last_end: usize,
}

impl Builder<'_, '_> {
    fn byte(&self, char_index: usize) -> usize {
        let byte = self
            .to_byte
            .get(char_index)
            .copied()
            .unwrap_or(self.text.len());
        // blanked multibyte chars are several spaces in `text`
        floor_char_boundary(self.original, byte)
    }

    fn trimmed(&self, start: usize, end: usize) -> Region {
        let end = end.clamp(start, self.text.len());
        let trimmed = self.text[start..end].trim_end().len();
        Region::new(start, start + trimmed)
    }

    fn node(&mut self) -> Option<AstNode> {
        let events = self.events;
        let (event, span) = events.get(self.pos)?;
        let start = self.byte(span.start.index());
        let end = self.byte(span.end.index());
        match event {
            Event::Scalar(value, style, _, _) => {
                self.pos += 1;
                let implicit_null = *style == ScalarStyle::Plain
                    && (value.is_empty()
                        || (value.as_ref() == "~" && !self.text[start..].starts_with('~')));
                let node = if implicit_null {
                    AstNode::scalar("", Region::empty(self.last_end))
                } else {
                    AstNode::scalar(value.to_string(), self.trimmed(start, end))
                };
                self.last_end = node.region.end;
                Some(node)
            }
            Event::Alias(_) => {
                self.pos += 1;
                let region = self.trimmed(start, end);
                self.last_end = region.end;
                Some(AstNode::scalar(region.text(self.text), region))
            }
            Event::MappingStart(..) => {
                self.pos += 1;
                self.last_end = start;
                let mut entries = Vec::new();
                let mut last = start;
                loop {
                    match events.get(self.pos) {
                        None => break,
                        Some((Event::MappingEnd, end_span)) => {
                            self.pos += 1;
                            last = self.close_flow(start, last, '{', '}', end_span);
                            break;
                        }
                        Some(_) => {
                            let Some(key) = self.node() else { break };
                            let value = self
                                .node()
                                .unwrap_or_else(|| AstNode::scalar("", Region::empty(key.region.end)));
                            last = last.max(key.region.end).max(value.region.end);
                            entries.push(AstEntry { key, value });
                        }
                    }
                }
                self.last_end = last;
                Some(AstNode {
                    kind: AstKind::Mapping(entries),
                    region: Region::new(start, last),
                })
            }
            Event::SequenceStart(..) => {
                self.pos += 1;
                self.last_end = floor_char_boundary(self.original, start + 1);
                let mut items = Vec::new();
                let mut last = start;
                loop {
                    match events.get(self.pos) {
                        None => break,
                        Some((Event::SequenceEnd, end_span)) => {
                            self.pos += 1;
                            last = self.close_flow(start, last, '[', ']', end_span);
                            break;
                        }
                        Some(_) => {
                            let Some(item) = self.node() else { break };
                            last = last.max(item.region.end);
                            items.push(item);
                        }
                    }
                }
                self.last_end = last;
                Some(AstNode {
                    kind: AstKind::Sequence(items),
                    region: Region::new(start, last),
                })
            }
            _ => None,
        }
    }

    /// Extends a flow collection to its closing bracket.
    fn close_flow(&self, start: usize, last: usize, open: char, close: char, end_span: &Span) -> usize {
        if !self.text[start..].starts_with(open) {
            return last;
        }
        let from = last.max(start + 1);
        match self.text[from..].find(close) {
            Some(i) => from + i + 1,
            None => last.max(self.byte(end_span.end.index())),
        }
    }
}
