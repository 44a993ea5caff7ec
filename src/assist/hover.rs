//! Hover documentation
//!
//! Hovers are computed from the parsed AST. Inside blocks the YAML parser
//! had to blank out, the structure tree is used instead.

use tracing::debug;

use crate::parser::ast::{AstNode, YamlAst};
use crate::parser::structure::{SNodeKind, StructureTree};
use crate::path::{PathSegment, YamlPath};
use crate::renderable::Renderable;
use crate::schema::types::{TypeUtil, YType};
use crate::text::Region;

use super::context::{AssistContext, AssistSource};

#[derive(Debug, Clone, PartialEq)]
pub struct Hover {
    pub markdown: String,
    /// The node the hover describes.
    pub region: Region,
}

pub struct HoverEngine<'a> {
    util: &'a TypeUtil,
    root: &'a YType,
}

impl<'a> HoverEngine<'a> {
    pub fn new(util: &'a TypeUtil, root: &'a YType) -> Self {
        Self { util, root }
    }

    pub fn hover(&self, text: &str, offset: usize) -> Option<Hover> {
        let structure = StructureTree::parse_with(text, self.util.relaxed_names());
        let ast = YamlAst::parse_with(text, structure);
        if ast.is_damaged(offset) {
            return self.structure_hover(&ast, offset);
        }
        let (path, node) = ast.path_at(offset)?;
        debug!("Hover at {} on {}", offset, path);
        let top = AssistContext::top_level(self.util, AssistSource::Ast(&ast), self.root);
        let infos: Vec<Renderable> = match path.last_segment() {
            Some(PathSegment::KeyAtKey(key)) => path
                .drop_last()
                .traverse_ambiguously(&top)
                .filter_map(|context| context.key_hover_info(key))
                .collect(),
            _ => path
                .traverse_ambiguously(&top)
                .filter_map(|context| self.value_hover(&context, node))
                .collect(),
        };
        to_hover(infos, node.region)
    }

    /// A hinted value shows the hint's documentation, anything else the
    /// property the value belongs to.
    fn value_hover(&self, context: &AssistContext<'_>, node: &AstNode) -> Option<Renderable> {
        if let (Some(ty), Some(value)) = (context.ty(), node.as_scalar()) {
            let hint_doc = self
                .util
                .hints_of(ty, &context.schema_context())
                .into_iter()
                .find(|h| h.value == value)
                .and_then(|h| h.documentation);
            if hint_doc.is_some() {
                return hint_doc;
            }
        }
        context.hover_info()
    }

    fn structure_hover(&self, ast: &YamlAst, offset: usize) -> Option<Hover> {
        let tree = ast.structure();
        let node = tree.find(offset)?;
        if !matches!(node.kind(), SNodeKind::Key | SNodeKind::Seq) {
            return None;
        }
        let top = AssistContext::top_level(self.util, AssistSource::Structure(tree), self.root);
        if node.is_in_key(offset) {
            let key = node.key()?;
            let parent_path = node.parent().map_or(YamlPath::EMPTY, |p| p.path());
            let infos = parent_path
                .traverse_ambiguously(&top)
                .filter_map(|context| context.key_hover_info(key))
                .collect();
            return to_hover(infos, node.key_region()?);
        }
        let infos = node
            .path()
            .traverse_ambiguously(&top)
            .filter_map(|context| context.hover_info())
            .collect();
        to_hover(infos, node.region())
    }
}

fn to_hover(infos: Vec<Renderable>, region: Region) -> Option<Hover> {
    let mut distinct: Vec<Renderable> = Vec::new();
    for info in infos {
        if !distinct.contains(&info) {
            distinct.push(info);
        }
    }
    if distinct.is_empty() {
        return None;
    }
    Some(Hover {
        markdown: Renderable::concat(distinct).render_as_markdown(),
        region,
    })
}
