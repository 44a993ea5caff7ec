//! Assist contexts
//!
//! An [`AssistContext`] pairs a schema type with a position in a document.
//! Contexts are reached from the top-level context by following the path of
//! the node under the cursor; since schemas may be ambiguous a step can lead
//! to several contexts, so the context itself is [`Navigable`].

use std::fmt;

use tracing::debug;

use crate::parser::ast::{AstRef, YamlAst};
use crate::parser::structure::StructureTree;
use crate::path::{Navigable, PathSegment, YamlPath};
use crate::renderable::Renderable;
use crate::schema::context::DynamicSchemaContext;
use crate::schema::types::{TypeUtil, YType, YTypedProperty};

/// The tree dynamic schema contexts are computed from.
#[derive(Debug, Clone, Copy)]
pub enum AssistSource<'a> {
    Structure(&'a StructureTree),
    Ast(&'a YamlAst),
}

impl<'a> AssistSource<'a> {
    /// Dynamic context of the node at `path`, or an empty one when the path
    /// leads nowhere.
    pub fn schema_context(&self, path: &YamlPath) -> DynamicSchemaContext<'a> {
        let found = match self {
            AssistSource::Structure(tree) => path
                .traverse(&tree.root())
                .map(|node| DynamicSchemaContext::from_structure(path.clone(), node)),
            AssistSource::Ast(ast) => path
                .traverse(&AstRef::File(ast))
                .and_then(|r| r.node())
                .map(|node| DynamicSchemaContext::from_ast(path.clone(), node)),
        };
        found.unwrap_or_else(|| {
            DynamicSchemaContext::new(path.clone(), crate::schema::context::ContextSource::Empty)
        })
    }
}

#[derive(Clone)]
enum ContextKind {
    /// Selects a document; its children are typed by the root type.
    TopLevel(YType),
    Typed(YType),
}

#[derive(Clone)]
pub struct AssistContext<'a> {
    util: &'a TypeUtil,
    source: AssistSource<'a>,
    kind: ContextKind,
    path: YamlPath,
    /// The bean property whose value this context is.
    property: Option<(YType, YTypedProperty)>,
}

impl<'a> AssistContext<'a> {
    pub fn top_level(util: &'a TypeUtil, source: AssistSource<'a>, root: &YType) -> Self {
        Self {
            util,
            source,
            kind: ContextKind::TopLevel(root.clone()),
            path: YamlPath::EMPTY,
            property: None,
        }
    }

    pub fn util(&self) -> &'a TypeUtil {
        self.util
    }

    /// The expected type, `None` for the top-level context.
    pub fn ty(&self) -> Option<&YType> {
        match &self.kind {
            ContextKind::TopLevel(_) => None,
            ContextKind::Typed(ty) => Some(ty),
        }
    }

    /// Path from the document root, document index first.
    pub fn path(&self) -> &YamlPath {
        &self.path
    }

    pub fn property(&self) -> Option<&YTypedProperty> {
        self.property.as_ref().map(|(_, p)| p)
    }

    pub fn schema_context(&self) -> DynamicSchemaContext<'a> {
        self.source.schema_context(&self.path)
    }

    /// The same position, pretending the expected type is `ty`.
    pub fn relaxed(&self, ty: YType) -> Self {
        Self {
            kind: ContextKind::Typed(ty),
            ..self.clone()
        }
    }

    /// Hover for the value at this context: the documentation of the
    /// property it belongs to.
    pub fn hover_info(&self) -> Option<Renderable> {
        let (owner, property) = self.property.as_ref()?;
        Some(property_hover(self.util, owner, property))
    }

    /// Hover for the key `key` inside this context.
    pub fn key_hover_info(&self, key: &str) -> Option<Renderable> {
        let ty = self.ty()?;
        let property = self.util.property(ty, key)?;
        Some(property_hover(self.util, ty, &property))
    }

    fn child(&self, segment: &PathSegment, ty: YType, property: Option<(YType, YTypedProperty)>) -> Self {
        let path = self.path.append(segment.clone());
        let context = self.source.schema_context(&path);
        let ty = self.util.infer_more_specific_type(&ty, &context);
        AssistContext {
            util: self.util,
            source: self.source,
            kind: ContextKind::Typed(ty),
            path,
            property,
        }
    }

    fn domain(&self, ty: &YType) -> Option<YType> {
        if self.util.is_any(ty) {
            return Some(ty.clone());
        }
        self.util.domain_type(ty)
    }

    fn step(&self, segment: &PathSegment) -> Vec<Self> {
        let util = self.util;
        let ty = match &self.kind {
            ContextKind::TopLevel(root) => {
                return match segment {
                    PathSegment::ValueAtIndex(_) => vec![self.child(segment, root.clone(), None)],
                    _ => Vec::new(),
                };
            }
            ContextKind::Typed(ty) => ty,
        };
        match segment {
            PathSegment::ValueAtKey(key) => {
                if util.is_map(ty) || (util.is_sequence(ty) && !util.is_bean(ty)) {
                    return self
                        .domain(ty)
                        .map(|domain| self.child(segment, domain, None))
                        .into_iter()
                        .collect();
                }
                let owners = if util.is_union(ty) {
                    util.union_members(ty)
                } else {
                    vec![ty.clone()]
                };
                owners
                    .into_iter()
                    .filter_map(|owner| {
                        let property = util.property(&owner, key)?;
                        let child_ty = property.ty().clone();
                        Some(self.child(segment, child_ty, Some((owner, property))))
                    })
                    .collect()
            }
            PathSegment::ValueAtIndex(_) if util.is_sequence(ty) => self
                .domain(ty)
                .map(|domain| self.child(segment, domain, None))
                .into_iter()
                .collect(),
            PathSegment::AnyChild => {
                if let Some(domain) = self.domain(ty) {
                    return vec![self.child(segment, domain, None)];
                }
                util.properties_of(ty)
                    .into_iter()
                    .map(|p| {
                        let segment = PathSegment::value_at(p.name());
                        self.child(&segment, p.ty().clone(), Some((ty.clone(), p)))
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

impl<'a> Navigable<'a> for AssistContext<'a> {
    fn traverse_ambiguously(&self, segment: &PathSegment) -> Box<dyn Iterator<Item = Self> + 'a> {
        let next = self.step(segment);
        debug!("Traversing {:?} with {} => {:?}", self, segment, next);
        Box::new(next.into_iter())
    }
}

impl fmt::Debug for AssistContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ContextKind::TopLevel(_) => write!(f, "TopLevelContext"),
            ContextKind::Typed(ty) => {
                write!(f, "TypeContext({}::{})", self.path.to_prop_string(), ty)
            }
        }
    }
}

/// Hover content for a bean property.
pub fn property_hover(util: &TypeUtil, owner: &YType, property: &YTypedProperty) -> Renderable {
    let mut parts = vec![
        Renderable::paragraph(Renderable::concat([
            Renderable::bold(Renderable::code(property.name())),
            Renderable::text(" : "),
            Renderable::code(util.nice_type_name(property.ty())),
        ])),
        Renderable::paragraph(Renderable::concat([
            Renderable::text("Property of "),
            Renderable::italic(Renderable::text(util.nice_type_name(owner))),
        ])),
    ];
    if !property.description().is_empty() {
        parts.push(Renderable::paragraph(property.description().clone()));
    }
    if property.is_deprecated() {
        let message = property
            .deprecation_message()
            .map_or_else(|| "Deprecated".to_string(), |m| format!("Deprecated: {m}"));
        parts.push(Renderable::paragraph(Renderable::italic(Renderable::text(
            message,
        ))));
    }
    Renderable::concat(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{atomic, bean, integer, map, prop, sequence, union};

    fn schema() -> YType {
        let server = bean(
            "Server",
            vec![prop("port", integer("Port", Some(1), None)).with_description("Server port.")],
        );
        bean(
            "Root",
            vec![
                prop("server", server),
                prop("labels", map(atomic("String"), atomic("String"))),
                prop("items", sequence(atomic("Item"))),
            ],
        )
    }

    fn path(segments: &[PathSegment]) -> YamlPath {
        YamlPath::new(segments.to_vec())
    }

    #[test]
    fn test_traverse_bean_property() {
        let util = TypeUtil::default();
        let tree = StructureTree::parse("server:\n  port: 80\n");
        let root = schema();
        let top = AssistContext::top_level(&util, AssistSource::Structure(&tree), &root);

        let ctx = path(&[
            PathSegment::index(0),
            PathSegment::value_at("server"),
            PathSegment::value_at("port"),
        ])
        .traverse(&top)
        .unwrap();
        assert_eq!(ctx.ty().unwrap().name(), "Port");
        assert_eq!(ctx.property().unwrap().name(), "port");
        let hover = ctx.hover_info().unwrap().render_as_markdown();
        assert!(hover.contains("Server port."));
        assert!(hover.contains("Property of *Server*"));
    }

    #[test]
    fn test_traverse_map_and_sequence() {
        let util = TypeUtil::default();
        let tree = StructureTree::parse("");
        let root = schema();
        let top = AssistContext::top_level(&util, AssistSource::Structure(&tree), &root);

        let label = path(&[
            PathSegment::index(0),
            PathSegment::value_at("labels"),
            PathSegment::value_at("anything"),
        ])
        .traverse(&top)
        .unwrap();
        assert_eq!(label.ty().unwrap().name(), "String");
        assert!(label.hover_info().is_none());

        let item = path(&[
            PathSegment::index(0),
            PathSegment::value_at("items"),
            PathSegment::index(3),
        ])
        .traverse(&top)
        .unwrap();
        assert_eq!(item.ty().unwrap().name(), "Item");

        let nothing = path(&[PathSegment::index(0), PathSegment::value_at("nope")]);
        assert!(nothing.traverse(&top).is_none());
    }

    #[test]
    fn test_undiscriminated_union_is_ambiguous() {
        let http = bean(
            "Http",
            vec![prop("url", atomic("Url")), prop("timeout", atomic("HttpTimeout"))],
        );
        let queue = bean(
            "Queue",
            vec![prop("topic", atomic("Topic")), prop("timeout", atomic("QueueTimeout"))],
        );
        let target = union("Target", vec![http, queue]).unwrap();
        let root = bean("Root", vec![prop("target", target)]);
        let util = TypeUtil::default();

        let tree = StructureTree::parse("target:\n  timeout: 1\n");
        let top = AssistContext::top_level(&util, AssistSource::Structure(&tree), &root);
        let timeouts: Vec<String> = path(&[
            PathSegment::index(0),
            PathSegment::value_at("target"),
            PathSegment::value_at("timeout"),
        ])
        .traverse_ambiguously(&top)
        .map(|c| c.ty().unwrap().name().to_string())
        .collect();
        assert_eq!(timeouts, vec!["HttpTimeout", "QueueTimeout"]);

        let tree = StructureTree::parse("target:\n  url: x\n  timeout: 1\n");
        let top = AssistContext::top_level(&util, AssistSource::Structure(&tree), &root);
        let timeouts: Vec<String> = path(&[
            PathSegment::index(0),
            PathSegment::value_at("target"),
            PathSegment::value_at("timeout"),
        ])
        .traverse_ambiguously(&top)
        .map(|c| c.ty().unwrap().name().to_string())
        .collect();
        assert_eq!(timeouts, vec!["HttpTimeout"]);
    }
}
