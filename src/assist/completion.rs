//! Schema-driven completion
//!
//! The cursor is resolved against the lenient structure tree only, so
//! completion works on text that is not valid YAML. The node under the
//! cursor decides which structure node gives the assist context; on a raw
//! line the indentation is ambiguous and every enclosing block that could
//! own the line is tried, with proposals re-indented to fit and ranked
//! lower the farther out they come from.

use std::cmp::Ordering;

use tracing::debug;

use crate::names::canonical_name;
use crate::parser::structure::{SNode, SNodeKind, StructureTree};
use crate::renderable::Renderable;
use crate::schema::context::DynamicSchemaContext;
use crate::schema::types::{prop, TypeUtil, YType, YTypedProperty};
use crate::text::{floor_char_boundary, Region};

use super::context::{property_hover, AssistContext, AssistSource};
use super::fuzzy::match_score;

pub const INDENT_BY: usize = 2;

pub const DEEMP_DEPRECATION: f64 = 0.2;
pub const DEEMP_DASH_PROPOSAL: f64 = 0.05;
pub const DEEMP_NEXT_CONTEXT: f64 = 0.1;
pub const DEEMP_INDENTED_PROPOSAL: f64 = 0.05;
pub const DEEMP_DEDENTED_PROPOSAL: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Property,
    Value,
}

/// A completion proposal. `insert_text` uses snippet syntax and replaces
/// the text in `replace`.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub label: String,
    pub insert_text: String,
    pub detail: Option<String>,
    pub documentation: Option<Renderable>,
    pub replace: Region,
    pub score: f64,
    pub kind: CompletionKind,
    pub deprecated: bool,
}

impl Completion {
    fn deemphasize(mut self, by: f64) -> Self {
        self.score -= by;
        self
    }
}

pub struct CompletionEngine<'a> {
    util: &'a TypeUtil,
    root: &'a YType,
    deindented_proposals: bool,
}

impl<'a> CompletionEngine<'a> {
    pub fn new(util: &'a TypeUtil, root: &'a YType) -> Self {
        Self {
            util,
            root,
            deindented_proposals: true,
        }
    }

    /// Whether proposals for an outer block may remove indentation.
    pub fn with_deindented_proposals(mut self, enabled: bool) -> Self {
        self.deindented_proposals = enabled;
        self
    }

    /// Proposals at `offset`, best first, ties ordered by label.
    pub fn complete(&self, text: &str, offset: usize) -> Vec<Completion> {
        let offset = floor_char_boundary(text, offset);
        if is_commented(text, offset) {
            return Vec::new();
        }
        let tree = StructureTree::parse_with(text, self.util.relaxed_names());
        let Some(current) = tree.find(offset) else {
            return Vec::new();
        };
        let cursor_indent = column(text, offset);
        let base_indent = current
            .indent()
            .map_or(cursor_indent, |indent| indent.min(cursor_indent));
        let context_nodes = context_nodes(current, offset, base_indent);
        debug!(
            "Completing at {} in {:?}, context nodes {:?}",
            offset, current, context_nodes
        );

        let request = Request {
            text,
            tree: &tree,
            offset,
        };
        let mut completions = Vec::new();
        if current.kind() == SNodeKind::Raw {
            let mut deemphasize_by = 0.0;
            for context_node in context_nodes {
                completions.extend(self.relaxed_completions(
                    &request,
                    current,
                    context_node,
                    base_indent,
                    deemphasize_by,
                ));
                deemphasize_by += DEEMP_NEXT_CONTEXT;
            }
        } else if let Some(context_node) = context_nodes.first() {
            completions = self.base_completions(&request, current, *context_node);
        }
        sort_and_dedupe(completions)
    }

    fn contexts_at<'t>(&self, request: &Request<'t>, node: SNode<'t>) -> Vec<AssistContext<'t>>
    where
        'a: 't,
    {
        let top = AssistContext::top_level(self.util, AssistSource::Structure(request.tree), self.root);
        node.path().traverse_ambiguously(&top).collect()
    }

    fn base_completions(&self, request: &Request<'_>, current: SNode<'_>, context_node: SNode<'_>) -> Vec<Completion> {
        let mut current = current;
        let mut context_node = context_node;
        let mut contexts = self.contexts_at(request, context_node);
        if contexts.is_empty() && is_dubious_key(context_node, request.offset) {
            if let (Some(c), Some(n)) = (current.parent(), context_node.parent()) {
                current = c;
                context_node = n;
                contexts = self.contexts_at(request, context_node);
            }
        }
        contexts
            .iter()
            .flat_map(|context| self.context_completions(request, context, current, true))
            .collect()
    }

    fn context_completions(
        &self,
        request: &Request<'_>,
        context: &AssistContext<'_>,
        current: SNode<'_>,
        with_dashes: bool,
    ) -> Vec<Completion> {
        let Some(ty) = context.ty() else {
            return Vec::new();
        };
        let util = self.util;
        if util.is_union(ty) {
            // not narrowed down yet: every member is still possible
            return util
                .union_members(ty)
                .into_iter()
                .flat_map(|member| {
                    self.context_completions(request, &context.relaxed(member), current, with_dashes)
                })
                .collect();
        }
        let query = prefix(request.text, current, request.offset);
        let schema_context = context.schema_context();
        let mut completions =
            self.value_completions(request, ty, &schema_context, current, query);
        if completions.is_empty() {
            completions = self.key_completions(request, ty, &schema_context, current, query);
        }
        if with_dashes && util.is_sequence(ty) && !util.is_any(ty) {
            if let Some(item) = util.domain_type(ty) {
                let dashed = self
                    .context_completions(request, &context.relaxed(item), current, false)
                    .into_iter()
                    .map(|c| add_dash(c, request.text, current).deemphasize(DEEMP_DASH_PROPOSAL));
                completions.extend(dashed);
            }
        }
        completions
    }

    fn value_completions(
        &self,
        request: &Request<'_>,
        ty: &YType,
        schema_context: &DynamicSchemaContext<'_>,
        current: SNode<'_>,
        query: &str,
    ) -> Vec<Completion> {
        let text = request.text;
        let query_start = request.offset - query.len();
        let reference_indent = schema_context
            .structure_node()
            .and_then(|n| n.indent())
            .or_else(|| current.indent())
            .unwrap_or(0);
        let mut completions = Vec::new();
        for hint in self.util.hints_of(ty, schema_context) {
            if hint.value == query {
                continue;
            }
            let score = match_score(query, &hint.value);
            if score == 0.0 {
                continue;
            }
            let mut insert_text = String::new();
            if !preceded_by_whitespace(text, query_start) {
                insert_text.push(' ');
            }
            insert_text.push_str(&escape_snippet(&hint.value));
            if let Some(extra) = &hint.extra_insertion {
                insert_text.push_str(&apply_indentation(extra, reference_indent));
            }
            completions.push(Completion {
                label: hint.label.clone(),
                insert_text,
                detail: Some(self.util.nice_type_name(ty)),
                documentation: hint.documentation.clone(),
                replace: Region::new(query_start, request.offset),
                score,
                kind: CompletionKind::Value,
                deprecated: false,
            });
        }
        completions
    }

    /// Keys for a bean, or hinted keys for a map.
    fn proposable_properties(&self, ty: &YType, schema_context: &DynamicSchemaContext<'_>) -> Vec<YTypedProperty> {
        let util = self.util;
        if util.is_bean(ty) {
            return util.properties_of(ty);
        }
        if util.is_map(ty) && !util.is_any(ty) {
            let (Some(key), Some(value)) = (util.key_type(ty), util.domain_type(ty)) else {
                return Vec::new();
            };
            return util
                .hints_of(&key, schema_context)
                .into_iter()
                .map(|hint| {
                    let property = prop(hint.value, value.clone());
                    match hint.documentation {
                        Some(doc) => property.with_description(doc),
                        None => property,
                    }
                })
                .collect();
        }
        Vec::new()
    }

    fn key_completions(
        &self,
        request: &Request<'_>,
        ty: &YType,
        schema_context: &DynamicSchemaContext<'_>,
        current: SNode<'_>,
        query: &str,
    ) -> Vec<Completion> {
        let util = self.util;
        let properties = self.proposable_properties(ty, schema_context);
        let defined = schema_context.defined_properties();
        let is_defined = |p: &YTypedProperty| {
            defined.iter().any(|key| {
                p.is_named(key)
                    || (util.relaxed_names() && canonical_name(key) == canonical_name(p.name()))
            })
        };
        let query_start = request.offset - query.len();
        let mut proposals = Vec::new();
        for tier in sort_into_tiers(properties, util.tiered_optional_proposals()) {
            let undefined: Vec<&YTypedProperty> = tier
                .iter()
                .filter(|p| !is_defined(*p))
                .filter(|p| util.suggest_deprecated_properties() || !p.is_deprecated())
                .collect();
            for property in &undefined {
                let spellings = if util.relaxed_names() {
                    property.spellings()
                } else {
                    vec![property.name().to_string()]
                };
                let Some((score, spelling)) = best_spelling(query, spellings) else {
                    continue;
                };
                let completion = Completion {
                    insert_text: self.property_insertion(request, current, query_start, &spelling, property.ty()),
                    label: spelling,
                    detail: Some(util.nice_type_name(property.ty())),
                    documentation: Some(property_hover(util, ty, property)),
                    replace: Region::new(query_start, request.offset),
                    score,
                    kind: CompletionKind::Property,
                    deprecated: property.is_deprecated(),
                };
                proposals.push(if property.is_deprecated() {
                    completion.deemphasize(DEEMP_DEPRECATION)
                } else {
                    completion
                });
            }
            // later tiers only once this tier's required properties exist
            if undefined.iter().any(|p| p.is_required()) {
                break;
            }
        }
        proposals
    }

    fn property_insertion(
        &self,
        request: &Request<'_>,
        current: SNode<'_>,
        query_start: usize,
        name: &str,
        ty: &YType,
    ) -> String {
        let mut snippet = String::new();
        let mut reference_indent = column(request.text, query_start);
        if current.kind() == SNodeKind::Key && current.is_in_value(request.offset) {
            snippet.push('\n');
            reference_indent = current.indent().unwrap_or(0) + INDENT_BY;
        } else if !preceded_by_whitespace(request.text, query_start) {
            snippet.push(' ');
            reference_indent += 1;
        }
        snippet.push_str(&escape_snippet(name));
        snippet.push(':');
        snippet.push_str(self.append_text_for(ty));
        apply_indentation(&snippet, reference_indent)
    }

    /// What follows `key:` for a value of type `ty`.
    fn append_text_for(&self, ty: &YType) -> &'static str {
        let util = self.util;
        if util.is_atomic(ty) {
            " $1"
        } else if util.is_sequence(ty) {
            "\n- $1"
        } else if util.is_bean(ty) || util.is_map(ty) {
            "\n  $1"
        } else {
            " $1"
        }
    }

    fn relaxed_completions(
        &self,
        request: &Request<'_>,
        current: SNode<'_>,
        context_node: SNode<'_>,
        base_indent: usize,
        deemphasize_by: f64,
    ) -> Vec<Completion> {
        let completions = self.base_completions(request, current, context_node);
        if completions.is_empty() {
            return completions;
        }
        let dashy_indent = target_indent(context_node, current, true);
        let plain_indent = target_indent(context_node, current, false);
        completions
            .into_iter()
            .filter_map(|c| {
                let target = if c.label.starts_with("- ") {
                    dashy_indent
                } else {
                    plain_indent
                };
                let fixed = match target.cmp(&base_indent) {
                    Ordering::Equal => Some(c),
                    Ordering::Greater if is_barren(context_node) => {
                        Some(indented(c, target - base_indent))
                    }
                    Ordering::Greater => None,
                    Ordering::Less if self.lesser_indent_relaxable(current, context_node) => {
                        dedented(c, base_indent - target, request.text)
                    }
                    Ordering::Less => None,
                };
                fixed.map(|c| c.deemphasize(deemphasize_by))
            })
            .collect()
    }

    /// Dedenting is only safe when no block between the context and the
    /// cursor continues after the cursor line.
    fn lesser_indent_relaxable(&self, current: SNode<'_>, context_node: SNode<'_>) -> bool {
        if !self.deindented_proposals {
            return false;
        }
        let mut parent = current.parent();
        while let Some(p) = parent {
            if p == context_node {
                break;
            }
            if let Some(last) = p.last_real_child() {
                if last.start() >= current.node_end() {
                    return false;
                }
            }
            parent = p.parent();
        }
        true
    }
}

struct Request<'t> {
    text: &'t str,
    tree: &'t StructureTree,
    offset: usize,
}

/// Structure nodes whose assist context applies at `offset`.
fn context_nodes<'t>(current: SNode<'t>, offset: usize, base_indent: usize) -> Vec<SNode<'t>> {
    match current.kind() {
        SNodeKind::Key | SNodeKind::Seq => {
            if current.is_in_value(offset) {
                vec![current]
            } else {
                current.parent().into_iter().collect()
            }
        }
        SNodeKind::Document => vec![current],
        SNodeKind::Raw => current
            .path_nodes()
            .into_iter()
            .rev()
            .filter(|n| n.segment().is_some() && n.indent().map_or(false, |i| i <= base_indent))
            .collect(),
        SNodeKind::Root => Vec::new(),
    }
}

/// The cursor sits right after a key's colon: typing on would turn the key
/// into a plain value.
fn is_dubious_key(node: SNode<'_>, offset: usize) -> bool {
    node.kind() == SNodeKind::Key && node.colon_offset().map_or(false, |colon| colon + 1 == offset)
}

fn is_barren(node: SNode<'_>) -> bool {
    match node.kind() {
        SNodeKind::Key => node.simple_value().map_or(true, str::is_empty),
        SNodeKind::Seq => node.text().trim() == "-",
        _ => false,
    }
}

/// Indentation that lines a new child up with the existing children.
fn target_indent(context_node: SNode<'_>, current: SNode<'_>, dashy: bool) -> usize {
    let sibling = context_node
        .children()
        .filter(|c| *c != current)
        .filter_map(|c| c.indent())
        .max();
    if let Some(indent) = sibling {
        return indent;
    }
    let indent = context_node.indent().unwrap_or(0);
    if dashy || context_node.kind() == SNodeKind::Document {
        indent
    } else {
        indent + INDENT_BY
    }
}

fn sort_into_tiers(properties: Vec<YTypedProperty>, tiered_optionals: bool) -> Vec<Vec<YTypedProperty>> {
    if properties.is_empty() {
        return Vec::new();
    }
    let mut primary = Vec::new();
    let mut second = Vec::new();
    let mut third = Vec::new();
    for p in properties {
        if p.is_primary() {
            primary.push(p);
        } else if !tiered_optionals || p.is_required() {
            second.push(p);
        } else {
            third.push(p);
        }
    }
    if tiered_optionals {
        vec![primary, second, third]
    } else {
        vec![primary, second]
    }
}

fn best_spelling(query: &str, spellings: Vec<String>) -> Option<(f64, String)> {
    let mut best: Option<(f64, String)> = None;
    for spelling in spellings {
        let score = match_score(query, &spelling);
        if score > 0.0 && best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, spelling));
        }
    }
    best
}

/// The query: the value typed after `key:` or `- `, else the run of
/// non-blank characters before the cursor.
fn prefix<'t>(text: &'t str, current: SNode<'_>, offset: usize) -> &'t str {
    let line_start = line_start(text, offset);
    let value_start = match current.kind() {
        SNodeKind::Key if current.is_in_value(offset) => current.colon_offset().map(|c| c + 1),
        SNodeKind::Seq if current.is_in_value(offset) => Some(current.start() + 1),
        _ => None,
    };
    match value_start {
        Some(start) => {
            let start = start.max(line_start).min(offset);
            text[start..offset].trim_start()
        }
        None => {
            let before = &text[line_start..offset];
            let start = before
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map_or(0, |(i, c)| i + c.len_utf8());
            &before[start..]
        }
    }
}

fn add_dash(mut completion: Completion, text: &str, node: SNode<'_>) -> Completion {
    let insert = completion.insert_text.as_str();
    let ws = insert.len() - insert.trim_start().len();
    let (prefix, rest) = insert.split_at(ws);
    let before = &text[line_start(text, completion.replace.start)..completion.replace.start];
    let needs_newline = completion.kind == CompletionKind::Value && !before.trim().is_empty();
    completion.insert_text = if needs_newline {
        let indent = " ".repeat(node.indent().unwrap_or(0));
        format!("{prefix}\n{indent}- {}", apply_indentation(rest.trim_start(), INDENT_BY))
    } else if ws > 2 && prefix.ends_with("  ") {
        format!("{}- {rest}", &prefix[..ws - 2])
    } else {
        format!("{prefix}- {}", apply_indentation(rest, INDENT_BY))
    };
    completion.label = format!("- {}", completion.label);
    completion
}

fn indented(mut completion: Completion, by: usize) -> Completion {
    let arrows = (by + 1) / 2;
    let indent = " ".repeat(by);
    let insert = completion.insert_text.as_str();
    let ws = insert.len() - insert.trim_start().len();
    let (prefix, rest) = insert.split_at(ws);
    completion.insert_text = format!("{prefix}{indent}{}", apply_indentation(rest, by));
    completion.label = format!("{}{}", "→ ".repeat(arrows), completion.label);
    completion.deemphasize(arrows as f64 * DEEMP_INDENTED_PROPOSAL)
}

/// Moves the proposal `by` columns left by also replacing the spaces
/// before it. `None` when those are not all spaces.
fn dedented(mut completion: Completion, by: usize, text: &str) -> Option<Completion> {
    let spaces_end = completion.replace.start;
    let spaces_start = spaces_end.checked_sub(by)?;
    let spaces = text.get(spaces_start..spaces_end)?;
    if !spaces.bytes().all(|b| b == b' ') {
        return None;
    }
    let arrows = by / 2;
    let insert = completion.insert_text.as_str();
    let ws = insert.len() - insert.trim_start().len();
    let (prefix, rest) = insert.split_at(ws);
    completion.insert_text = format!("{prefix}{}", remove_indentation(rest, by));
    completion.replace = Region::new(spaces_start, completion.replace.end);
    completion.label = format!("{}{}", "← ".repeat(arrows), completion.label);
    Some(completion.deemphasize(arrows as f64 * DEEMP_DEDENTED_PROPOSAL))
}

fn sort_and_dedupe(mut completions: Vec<Completion>) -> Vec<Completion> {
    completions.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });
    let mut seen = Vec::new();
    completions.retain(|c| {
        let key = (c.label.clone(), c.insert_text.clone(), c.replace);
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
    completions
}

fn apply_indentation(text: &str, indent: usize) -> String {
    text.replace('\n', &format!("\n{}", " ".repeat(indent)))
}

fn remove_indentation(text: &str, by: usize) -> String {
    let mut lines = text.split('\n');
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        let spaces = line.bytes().take_while(|b| *b == b' ').count().min(by);
        out.push('\n');
        out.push_str(&line[spaces..]);
    }
    out
}

fn escape_snippet(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('$', "\\$")
        .replace('}', "\\}")
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |i| i + 1)
}

fn column(text: &str, offset: usize) -> usize {
    text[line_start(text, offset)..offset].chars().count()
}

fn preceded_by_whitespace(text: &str, offset: usize) -> bool {
    text[..offset].chars().next_back().map_or(true, char::is_whitespace)
}

/// A `#` starting a comment on the cursor line, before the cursor.
fn is_commented(text: &str, offset: usize) -> bool {
    let before = &text[line_start(text, offset)..offset];
    let mut previous = ' ';
    for c in before.chars() {
        if c == '#' && previous.is_whitespace() {
            return true;
        }
        previous = c;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{atomic, bean, enumeration, map, sequence, union, SchemaOptions};

    fn labels(completions: &[Completion]) -> Vec<&str> {
        completions.iter().map(|c| c.label.as_str()).collect()
    }

    fn complete_at_cursor(util: &TypeUtil, root: &YType, text_with_cursor: &str) -> Vec<Completion> {
        let offset = text_with_cursor.find('|').unwrap();
        let text = text_with_cursor.replacen('|', "", 1);
        CompletionEngine::new(util, root).complete(&text, offset)
    }

    fn app_schema() -> YType {
        let server = bean(
            "Server",
            vec![
                prop("port", atomic("Port")),
                prop("host", atomic("Host")),
            ],
        );
        let app = bean(
            "Application",
            vec![
                prop("name", atomic("Name")).required(),
                prop("memory", atomic("Memory").with_hints(["512M", "1G"])),
                prop("old-memory", atomic("Memory")).deprecated(Some("Use memory")),
                prop("env", map(atomic("String"), atomic("String"))),
            ],
        );
        bean(
            "Root",
            vec![
                prop("server", server),
                prop("applications", sequence(app)),
                prop("mode", enumeration("Mode", &["fast", "slow"])),
            ],
        )
    }

    #[test]
    fn test_top_level_keys() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "|");
        assert_eq!(labels(&completions), vec!["applications", "mode", "server"]);
        let server = completions.iter().find(|c| c.label == "server").unwrap();
        assert_eq!(server.insert_text, "server:\n  $1");
        let apps = completions.iter().find(|c| c.label == "applications").unwrap();
        assert_eq!(apps.insert_text, "applications:\n- $1");
        let mode = completions.iter().find(|c| c.label == "mode").unwrap();
        assert_eq!(mode.insert_text, "mode: $1");
        assert_eq!(mode.detail.as_deref(), Some("Mode"));
    }

    #[test]
    fn test_defined_keys_are_not_proposed() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "mode: fast\n|");
        assert_eq!(labels(&completions), vec!["applications", "server"]);
    }

    #[test]
    fn test_query_filters_and_ranks() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "ser|");
        assert_eq!(labels(&completions), vec!["server"]);
        assert_eq!(completions[0].replace, Region::new(0, 3));
    }

    #[test]
    fn test_nested_keys_after_colon_get_newline() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "server:|");
        let port = completions.iter().find(|c| c.label == "port").unwrap();
        assert_eq!(port.insert_text, "\n  port: $1");
    }

    #[test]
    fn test_nested_keys_on_indented_line() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "server:\n  port: 80\n  h|");
        assert_eq!(completions[0].label, "host");
        assert_eq!(completions[0].insert_text, "host: $1");
    }

    #[test]
    fn test_value_hints() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "mode: f|");
        assert_eq!(labels(&completions), vec!["fast"]);
        assert_eq!(completions[0].insert_text, "fast");
        assert_eq!(completions[0].kind, CompletionKind::Value);

        let completions = complete_at_cursor(&util, &root, "mode:|");
        assert_eq!(labels(&completions), vec!["fast", "slow"]);
        assert_eq!(completions[0].insert_text, " fast");

        // the value already typed is not proposed again
        let completions = complete_at_cursor(&util, &root, "mode: fast|");
        assert!(completions.is_empty());
    }

    #[test]
    fn test_required_tier_comes_first() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "applications:\n- |");
        assert_eq!(labels(&completions), vec!["name"]);

        // a new item or an outer key would need less indentation
        let completions = complete_at_cursor(&util, &root, "applications:\n- name: a\n  |");
        assert_eq!(labels(&completions)[..2], ["env", "memory"]);
        assert!(labels(&completions)[2..].iter().all(|l| l.starts_with("← ")));
    }

    #[test]
    fn test_untiered_and_deprecated_options() {
        let util = TypeUtil::new(SchemaOptions {
            tiered_optional_proposals: false,
            suggest_deprecated_properties: true,
            relaxed_names: false,
        });
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "applications:\n- |");
        assert_eq!(labels(&completions), vec!["env", "memory", "name", "old-memory"]);
        let old = completions.iter().find(|c| c.label == "old-memory").unwrap();
        assert!(old.deprecated);
        let memory = completions.iter().find(|c| c.label == "memory").unwrap();
        assert!(old.score < memory.score);
    }

    #[test]
    fn test_dashed_proposals_for_sequences() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "applications:|");
        let dashed = completions.iter().find(|c| c.label == "- name").unwrap();
        assert_eq!(dashed.insert_text, "\n- name: $1");
    }

    #[test]
    fn test_map_key_hints() {
        let util = TypeUtil::default();
        let workflows = map(atomic("WorkflowName").with_hints(["main"]), bean("Workflow", Vec::new()));
        let completions = complete_at_cursor(&util, &workflows, "|");
        assert_eq!(labels(&completions), vec!["main"]);
        assert_eq!(completions[0].insert_text, "main:\n  $1");

        let completions = complete_at_cursor(&util, &workflows, "main:\n  x: 1\n|");
        assert!(completions.is_empty());
    }

    #[test]
    fn test_union_proposes_every_member() {
        let http = bean("Http", vec![prop("url", atomic("Url"))]);
        let queue = bean("Queue", vec![prop("topic", atomic("Topic"))]);
        let root = bean(
            "Root",
            vec![prop("target", union("Target", vec![http, queue]).unwrap())],
        );
        let util = TypeUtil::default();
        let completions = complete_at_cursor(&util, &root, "target:\n  |");
        assert_eq!(labels(&completions), vec!["topic", "url"]);
    }

    #[test]
    fn test_dedented_proposals_for_outer_context() {
        let util = TypeUtil::default();
        let root = app_schema();
        let completions = complete_at_cursor(&util, &root, "server:\n  port: 80\n  |");
        let host = completions.iter().find(|c| c.label == "host").unwrap();
        let mode = completions.iter().find(|c| c.label == "← mode").unwrap();
        assert!(host.score > mode.score);
        assert_eq!(mode.replace, Region::new(19, 21));
        assert_eq!(mode.insert_text, "mode: $1");

        let engine = CompletionEngine::new(&util, &root).with_deindented_proposals(false);
        let text = "server:\n  port: 80\n  ";
        let completions = engine.complete(text, text.len());
        assert!(completions.iter().all(|c| !c.label.starts_with('←')));
    }

    #[test]
    fn test_no_completions_in_comments() {
        let util = TypeUtil::default();
        let root = app_schema();
        assert!(complete_at_cursor(&util, &root, "# ser|").is_empty());
    }

    #[test]
    fn test_relaxed_spellings() {
        let util = TypeUtil::new(SchemaOptions {
            relaxed_names: true,
            ..SchemaOptions::default()
        });
        let root = bean(
            "Root",
            vec![prop("max-threads", atomic("Threads")).with_alias("workers")],
        );
        let completions = complete_at_cursor(&util, &root, "wor|");
        assert_eq!(labels(&completions), vec!["workers"]);
        let completions = complete_at_cursor(&util, &root, "maxThreads: 2\n|");
        assert!(completions.is_empty());
    }

    #[test]
    fn test_prefix_helpers() {
        let text = "key: val";
        let tree = StructureTree::parse(text);
        let node = tree.find(8).unwrap();
        assert_eq!(prefix(text, node, 8), "val");
        assert_eq!(remove_indentation("a:\n    b", 2), "a:\n  b");
        assert_eq!(escape_snippet("${x}"), "\\${x\\}");
    }
}
