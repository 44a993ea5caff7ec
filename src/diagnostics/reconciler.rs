//! Schema validation of a whole document
//!
//! The reconciler walks every parsed document together with the type the
//! dialect expects at each node. Blocks the YAML parser had to blank out
//! are walked over the structure tree instead, with fewer checks. Type
//! constraints are collected during the walk and verified at the end.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::parser::ast::{AstEntry, AstKind, AstNode, DamagedRegion, YamlAst};
use crate::parser::structure::{SNode, SNodeKind, StructureTree};
use crate::path::{PathSegment, YamlPath};
use crate::schema::constraints::{Constraint, ConstraintTarget, FoundProperty};
use crate::schema::context::DynamicSchemaContext;
use crate::schema::dialect::Dialect;
use crate::schema::types::{TypeUtil, YType, YTypedProperty};
use crate::text::Region;

use super::problems::{Problem, ProblemKind};

/// Validates documents against a dialect.
pub struct SchemaReconciler<'a> {
    util: &'a TypeUtil,
    dialect: &'a Dialect,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(util: &'a TypeUtil, dialect: &'a Dialect) -> Self {
        Self { util, dialect }
    }

    /// Problems in `text`, ordered by position, with default severities.
    pub fn reconcile(&self, text: &str) -> Vec<Problem> {
        let structure = StructureTree::parse_with(text, self.util.relaxed_names());
        let ast = YamlAst::parse_with(text, structure);
        self.reconcile_ast(&ast)
    }

    pub fn reconcile_ast(&self, ast: &YamlAst) -> Vec<Problem> {
        let mut walk = Walk {
            util: self.util,
            ast,
            problems: Vec::new(),
            pending: Vec::new(),
            visited_damage: HashSet::new(),
        };
        for error in ast.syntax_errors() {
            walk.problems.push(Problem::new(
                ProblemKind::SyntaxError,
                error.region,
                error.message.clone(),
            ));
        }

        for document in ast.documents() {
            let path = YamlPath::new(vec![PathSegment::index(document.index)]);
            let root = &document.root;
            let extra = walk.damaged_keys_at(&path);
            let context = DynamicSchemaContext::from_ast(path.clone(), root)
                .with_extra_properties(extra.iter().map(|f| f.name.clone()));
            let ty = self.util.infer_more_specific_type(self.dialect.root(), &context);
            for constraint in self.dialect.constraints() {
                let context = DynamicSchemaContext::from_ast(path.clone(), root)
                    .with_extra_properties(extra.iter().map(|f| f.name.clone()));
                walk.defer(
                    constraint.clone(),
                    context,
                    ConstraintTarget {
                        parent: None,
                        node: root.region,
                        key: None,
                        ty: ty.clone(),
                        found: found_in_mapping(root, &extra),
                    },
                );
            }
            walk.ast_node(None, None, root, &ty, &path);
        }

        // whole documents that had to be blanked
        for damage in walk.take_damage(&YamlPath::EMPTY) {
            if let Some(block) = ast.structure().node(damage.block) {
                if block.kind() == SNodeKind::Document {
                    walk.structure_node(block, self.dialect.root(), &block.path());
                }
            }
        }

        walk.finish()
    }
}

struct PendingCheck<'r> {
    constraint: Arc<dyn Constraint>,
    context: DynamicSchemaContext<'r>,
    target: ConstraintTarget,
}

enum Lookup {
    Known(YTypedProperty),
    /// Declared by several members of an undecided union.
    Ambiguous,
    Unknown,
}

struct Walk<'r> {
    util: &'r TypeUtil,
    ast: &'r YamlAst,
    problems: Vec<Problem>,
    pending: Vec<PendingCheck<'r>>,
    visited_damage: HashSet<usize>,
}

impl<'r> Walk<'r> {
    fn defer(&mut self, constraint: Arc<dyn Constraint>, context: DynamicSchemaContext<'r>, target: ConstraintTarget) {
        self.pending.push(PendingCheck {
            constraint,
            context,
            target,
        });
    }

    fn finish(mut self) -> Vec<Problem> {
        for check in std::mem::take(&mut self.pending) {
            match check.constraint.verify(&check.context, &check.target) {
                Ok(problems) => self.problems.extend(problems),
                Err(error) => warn!(
                    "Ignoring failed constraint on {} at {}: {}",
                    check.target.ty, check.target.node, error
                ),
            }
        }
        self.problems.sort_by_key(|p| p.region.start);
        self.problems
    }

    /// Damaged blocks directly under `path` not handled yet.
    fn take_damage(&mut self, path: &YamlPath) -> Vec<&'r DamagedRegion> {
        let mut taken = Vec::new();
        for (index, damage) in self.ast.damaged_regions().iter().enumerate() {
            if damage.parent_path == *path && self.visited_damage.insert(index) {
                taken.push(damage);
            }
        }
        taken
    }

    fn damaged_keys_at(&self, path: &YamlPath) -> Vec<FoundProperty> {
        self.ast
            .damaged_regions()
            .iter()
            .filter(|d| d.parent_path == *path)
            .filter_map(|d| d.key.as_ref())
            .map(|(name, region)| FoundProperty::new(name.clone(), *region))
            .collect()
    }

    /// Accepts anything: `Any`, or a context-sensitive type not decided yet.
    fn is_unconstrained(&self, ty: &YType) -> bool {
        let util = self.util;
        util.is_any(ty)
            || (util.is_atomic(ty) && util.is_map(ty) && util.is_bean(ty) && util.is_sequence(ty))
    }

    fn lookup(&self, ty: &YType, key: &str) -> Lookup {
        let util = self.util;
        if util.is_union(ty) {
            let mut found: Vec<YTypedProperty> = util
                .union_members(ty)
                .iter()
                .filter_map(|member| util.property(member, key))
                .collect();
            return match found.len() {
                0 => Lookup::Unknown,
                1 => Lookup::Known(found.remove(0)),
                _ => Lookup::Ambiguous,
            };
        }
        match util.property(ty, key) {
            Some(property) => Lookup::Known(property),
            None => Lookup::Unknown,
        }
    }

    fn type_mismatch(&mut self, ty: &YType, found: &str, region: Region) {
        self.problems.push(Problem::new(
            ProblemKind::TypeMismatch,
            region,
            format!(
                "Expecting a '{}' but found a '{}'",
                self.util.nice_type_name(ty),
                found
            ),
        ));
    }

    /// Unknown and deprecated checks for one key of a bean. Returns the
    /// property when its value should be walked.
    fn check_key(&mut self, ty: &YType, key: &str, key_region: Region) -> Option<YTypedProperty> {
        match self.lookup(ty, key) {
            Lookup::Unknown => {
                self.problems.push(Problem::new(
                    ProblemKind::UnknownProperty,
                    key_region,
                    format!(
                        "Unknown property '{}' for type '{}'",
                        key,
                        self.util.nice_type_name(ty)
                    ),
                ));
                None
            }
            Lookup::Ambiguous => None,
            Lookup::Known(property) => {
                if property.is_deprecated() {
                    let message = property.deprecation_message().map_or_else(
                        || {
                            format!(
                                "Property '{}' of '{}' is deprecated",
                                key,
                                self.util.nice_type_name(ty)
                            )
                        },
                        str::to_string,
                    );
                    self.problems
                        .push(Problem::new(ProblemKind::Deprecated, key_region, message));
                }
                Some(property)
            }
        }
    }

    fn ast_node(
        &mut self,
        parent: Option<Region>,
        key: Option<&AstNode>,
        node: &'r AstNode,
        ty: &YType,
        path: &YamlPath,
    ) {
        let damage = self.take_damage(path);
        let extra: Vec<FoundProperty> = damage
            .iter()
            .filter_map(|d| d.key.as_ref())
            .map(|(name, region)| FoundProperty::new(name.clone(), *region))
            .collect();
        let context = || {
            DynamicSchemaContext::from_ast(path.clone(), node)
                .with_extra_properties(extra.iter().map(|f| f.name.clone()))
        };
        let ty = self.util.infer_more_specific_type(ty, &context());
        debug!("Reconciling {} as {}", path, ty);

        match &node.kind {
            AstKind::Mapping(entries) => self.mapping(key, node, entries, &ty, path, &extra),
            AstKind::Sequence(items) => self.sequence(node, items, &ty, path),
            AstKind::Scalar(value) => self.scalar(node, value, &ty, &context(), !damage.is_empty()),
        }
        for constraint in self.util.constraints_of(&ty) {
            let target = ConstraintTarget {
                parent,
                node: node.region,
                key: key.map(|k| k.region),
                ty: ty.clone(),
                found: found_in_mapping(node, &extra),
            };
            self.defer(constraint, context(), target);
        }
        for damage in damage {
            self.damaged_block(damage, &ty, path);
        }
    }

    fn mapping(
        &mut self,
        key: Option<&AstNode>,
        node: &'r AstNode,
        entries: &'r [AstEntry],
        ty: &YType,
        path: &YamlPath,
        damaged_keys: &[FoundProperty],
    ) {
        self.duplicate_keys(entries);
        if self.is_unconstrained(ty) {
            return;
        }
        let util = self.util;
        if util.is_bean(ty) {
            let mut all_known = true;
            let mut defined = Vec::new();
            for entry in entries {
                let Some(name) = entry.key_text() else {
                    continue;
                };
                if is_templated(name) {
                    continue;
                }
                match self.check_key(ty, name, entry.key.region) {
                    Some(property) => {
                        defined.push(property.name().to_string());
                        let child = path.append(PathSegment::value_at(name));
                        self.ast_node(Some(node.region), Some(&entry.key), &entry.value, property.ty(), &child);
                    }
                    None => all_known &= matches!(self.lookup(ty, name), Lookup::Ambiguous),
                }
            }
            for found in damaged_keys {
                match self.lookup(ty, &found.name) {
                    Lookup::Known(property) => defined.push(property.name().to_string()),
                    Lookup::Ambiguous => {}
                    Lookup::Unknown => all_known = false,
                }
            }
            if all_known && !util.is_union(ty) {
                self.missing_required(ty, &defined, key.map_or(node.region, |k| k.region));
            }
        } else if util.is_map(ty) {
            let key_type = util.key_type(ty);
            let value_type = util.domain_type(ty);
            for entry in entries {
                let Some(name) = entry.key_text() else {
                    continue;
                };
                if let Some(key_type) = &key_type {
                    let key_path = path.append(PathSegment::key_at(name));
                    self.ast_node(Some(node.region), None, &entry.key, key_type, &key_path);
                }
                if let Some(value_type) = &value_type {
                    let child = path.append(PathSegment::value_at(name));
                    self.ast_node(Some(node.region), Some(&entry.key), &entry.value, value_type, &child);
                }
            }
        } else {
            self.type_mismatch(ty, "Map", node.region);
        }
    }

    fn missing_required(&mut self, ty: &YType, defined: &[String], region: Region) {
        let missing: Vec<String> = self
            .util
            .properties_of(ty)
            .into_iter()
            .filter(|p| p.is_required() && !defined.iter().any(|d| d == p.name()))
            .map(|p| p.name().to_string())
            .collect();
        let type_name = self.util.nice_type_name(ty);
        let message = match missing.as_slice() {
            [] => return,
            [one] => format!("Property '{one}' is required for '{type_name}'"),
            many => format!("Properties [{}] are required for '{type_name}'", many.join(", ")),
        };
        self.problems
            .push(Problem::new(ProblemKind::MissingRequired, region, message));
    }

    fn duplicate_keys(&mut self, entries: &[AstEntry]) {
        let mut occurrences: BTreeMap<&str, Vec<Region>> = BTreeMap::new();
        for entry in entries {
            if let Some(name) = entry.key_text() {
                occurrences.entry(name).or_default().push(entry.key.region);
            }
        }
        for (name, regions) in occurrences {
            if regions.len() < 2 {
                continue;
            }
            for region in regions {
                self.problems.push(Problem::new(
                    ProblemKind::DuplicateKey,
                    region,
                    format!("Duplicate key '{name}'"),
                ));
            }
        }
    }

    fn sequence(&mut self, node: &'r AstNode, items: &'r [AstNode], ty: &YType, path: &YamlPath) {
        if self.is_unconstrained(ty) {
            return;
        }
        match self.util.element_type_of(ty) {
            Some(element) => {
                for (index, item) in items.iter().enumerate() {
                    let child = path.append(PathSegment::index(index));
                    self.ast_node(Some(node.region), None, item, &element, &child);
                }
            }
            None => self.type_mismatch(ty, "Sequence", node.region),
        }
    }

    fn scalar(
        &mut self,
        node: &AstNode,
        value: &str,
        ty: &YType,
        context: &DynamicSchemaContext<'_>,
        has_damaged_children: bool,
    ) {
        // an empty value is still being typed; damaged children are walked separately
        if node.is_empty_scalar() || has_damaged_children || is_templated(value) {
            return;
        }
        let util = self.util;
        if util.is_atomic(ty) {
            let Some(parser) = util.value_parser_of(ty) else {
                return;
            };
            if let Err(error) = parser.parse(value, context) {
                let region = match error.highlight {
                    Some((start, end)) => {
                        let start = (node.region.start + start).min(node.region.end);
                        let end = (node.region.start + end).clamp(start, node.region.end);
                        Region::new(start, end)
                    }
                    None => node.region,
                };
                if error.deprecated {
                    let problem = Problem::new(ProblemKind::Deprecated, region, error.message);
                    self.problems.push(match error.replacement {
                        Some(replacement) => problem.with_replacement(replacement),
                        None => problem,
                    });
                } else {
                    let message = if error.message.is_empty() {
                        format!("Couldn't parse as '{}'", util.nice_type_name(ty))
                    } else {
                        error.message
                    };
                    self.problems
                        .push(Problem::new(ProblemKind::InvalidValue, region, message));
                }
            }
        } else if !self.is_unconstrained(ty) {
            self.type_mismatch(ty, "Scalar", node.region);
        }
    }

    /// A blanked block under an AST node of type `ty`.
    fn damaged_block(&mut self, damage: &'r DamagedRegion, ty: &YType, path: &YamlPath) {
        let Some(block) = self.ast.structure().node(damage.block) else {
            return;
        };
        debug!("Reconciling damaged block {} under {}", damage.region, path);
        match block.kind() {
            SNodeKind::Key => self.structure_key(block, ty, path),
            SNodeKind::Seq => {
                if let Some(element) = self.util.element_type_of(ty) {
                    let child = path.append(PathSegment::index(block.index()));
                    self.structure_node(block, &element, &child);
                }
            }
            _ => {}
        }
    }

    fn structure_key(&mut self, node: SNode<'r>, parent_ty: &YType, path: &YamlPath) {
        let (Some(key), Some(key_region)) = (node.key(), node.key_region()) else {
            return;
        };
        if self.is_unconstrained(parent_ty) || is_templated(key) {
            return;
        }
        let child = path.append(PathSegment::value_at(key));
        if self.util.is_bean(parent_ty) {
            if let Some(property) = self.check_key(parent_ty, key, key_region) {
                self.structure_node(node, property.ty(), &child);
            }
        } else if let Some(value_type) = self.util.domain_type(parent_ty) {
            if self.util.is_map(parent_ty) {
                self.structure_node(node, &value_type, &child);
            }
        }
    }

    /// Walks a block of the structure tree: key checks and constraints, no
    /// value parsing.
    fn structure_node(&mut self, node: SNode<'r>, ty: &YType, path: &YamlPath) {
        let context = DynamicSchemaContext::from_structure(path.clone(), node);
        let ty = self.util.infer_more_specific_type(ty, &context);
        if self.is_unconstrained(&ty) {
            return;
        }
        for child in node.children() {
            match child.kind() {
                SNodeKind::Key => self.structure_key(child, &ty, path),
                SNodeKind::Seq => {
                    if let Some(element) = self.util.element_type_of(&ty) {
                        let child_path = path.append(PathSegment::index(child.index()));
                        self.structure_node(child, &element, &child_path);
                    }
                }
                _ => {}
            }
        }
        let found: Vec<FoundProperty> = node
            .children()
            .filter_map(|c| Some(FoundProperty::new(c.key()?, c.key_region()?)))
            .collect();
        for constraint in self.util.constraints_of(&ty) {
            let target = ConstraintTarget {
                parent: node.parent().map(|p| p.tree_region()),
                node: node.tree_region(),
                key: node.key_region(),
                ty: ty.clone(),
                found: found.clone(),
            };
            self.defer(
                constraint,
                DynamicSchemaContext::from_structure(path.clone(), node),
                target,
            );
        }
    }
}

fn found_in_mapping(node: &AstNode, extra: &[FoundProperty]) -> Vec<FoundProperty> {
    let mut found: Vec<FoundProperty> = node
        .as_mapping()
        .unwrap_or_default()
        .iter()
        .filter_map(|e| Some(FoundProperty::new(e.key_text()?, e.key.region)))
        .collect();
    found.extend(extra.iter().cloned());
    found
}

/// Template placeholders are filled in later; their content is not checked.
fn is_templated(text: &str) -> bool {
    text.contains("{{") || text.contains("${")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::constraints::require_one_of;
    use crate::schema::types::{
        any, atomic, bean, integer, map, prop, sequence, union, EnumTypeBuilder,
    };
    use assert_matches::assert_matches;

    fn manifest() -> Dialect {
        let route = bean(
            "Route",
            vec![prop("route", atomic("String")).required()],
        );
        let application = bean(
            "Application",
            vec![
                prop("name", atomic("String")).required(),
                prop("instances", integer("Instances", Some(1), None)),
                prop("memory", atomic("Memory")),
                prop("buildpack", atomic("String")).deprecated(Some("Use 'buildpacks'")),
                prop("buildpacks", sequence(atomic("String"))),
                prop("routes", sequence(route)),
                prop("env", map(atomic("String"), any("Value"))),
                prop(
                    "health-check-type",
                    EnumTypeBuilder::new("HealthCheck", &["port", "http", "none"])
                        .deprecate_with_replacement("none", "process")
                        .build(),
                ),
            ],
        );
        let root = bean(
            "Manifest",
            vec![
                prop("name", atomic("String")),
                prop("applications", sequence(application)),
            ],
        );
        Dialect::new("manifest", root)
    }

    fn reconcile(dialect: &Dialect, text: &str) -> Vec<Problem> {
        let util = TypeUtil::default();
        SchemaReconciler::new(&util, dialect).reconcile(text)
    }

    #[test]
    fn test_unknown_property() {
        let problems = reconcile(&manifest(), "name: some-name\nblah: hoooo\n");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::UnknownProperty);
        assert_eq!(problems[0].region, Region::new(16, 20));
        assert_eq!(problems[0].message, "Unknown property 'blah' for type 'Manifest'");
    }

    #[test]
    fn test_valid_document_has_no_problems() {
        let text = "applications:\n- name: app\n  instances: 2\n  routes:\n  - route: a.example.com\n  env:\n    A: [1, 2]\n";
        assert!(reconcile(&manifest(), text).is_empty());
    }

    #[test]
    fn test_missing_required_only_when_keys_known() {
        let problems = reconcile(&manifest(), "applications:\n- memory: 1G\n");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::MissingRequired);
        assert_eq!(problems[0].message, "Property 'name' is required for 'Application'");

        let problems = reconcile(&manifest(), "applications:\n- memory: 1G\n  typo: x\n");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::UnknownProperty);
    }

    #[test]
    fn test_missing_required_in_nested_items() {
        let text = "applications:\n- name: a\n  routes:\n  - {}\n";
        let problems = reconcile(&manifest(), text);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].message, "Property 'route' is required for 'Route'");
        assert_eq!(problems[0].region.text(text), "{}");

        let problems = reconcile(&manifest(), "applications:\n- name: a\n  routes:\n  - other: 1\n");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::UnknownProperty);
    }

    #[test]
    fn test_value_parse_errors() {
        let text = "applications:\n- name: a\n  instances: zero\n";
        let problems = reconcile(&manifest(), text);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::InvalidValue);
        assert_eq!(problems[0].region.text(text), "zero");
    }

    #[test]
    fn test_deprecations() {
        let text = "applications:\n- name: a\n  buildpack: java\n  health-check-type: none\n";
        let problems = reconcile(&manifest(), text);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.kind == ProblemKind::Deprecated));
        assert_eq!(problems[0].message, "Use 'buildpacks'");
        assert_eq!(problems[0].region.text(text), "buildpack");
        assert_eq!(problems[1].replacement.as_deref(), Some("process"));
    }

    #[test]
    fn test_type_mismatches() {
        let text = "applications:\n  name: a\n";
        let problems = reconcile(&manifest(), text);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::TypeMismatch);
        assert_eq!(
            problems[0].message,
            "Expecting a 'List<Application>' but found a 'Map'"
        );

        let problems = reconcile(&manifest(), "applications: nope\n");
        assert_eq!(problems[0].kind, ProblemKind::TypeMismatch);
        assert!(problems[0].message.ends_with("found a 'Scalar'"));

        // still being typed
        assert!(reconcile(&manifest(), "applications:\n").is_empty());
    }

    #[test]
    fn test_duplicate_keys() {
        let text = "name: a\nname: b\n";
        let problems = reconcile(&manifest(), text);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.kind == ProblemKind::DuplicateKey));
        assert_eq!(problems[1].region, Region::new(8, 12));
    }

    #[test]
    fn test_constraints_run_after_walk() {
        let target = bean(
            "Target",
            vec![prop("url", atomic("String")), prop("queue", atomic("String"))],
        )
        .require(require_one_of(&["url", "queue"]));
        let dialect = Dialect::new("targets", bean("Root", vec![prop("target", target)]));

        let problems = reconcile(&dialect, "target:\n  other: 1\n");
        assert_matches!(
            problems.iter().map(|p| p.kind).collect::<Vec<_>>().as_slice(),
            [ProblemKind::MissingRequired, ProblemKind::UnknownProperty]
        );
        assert!(reconcile(&dialect, "target:\n  url: x\n").is_empty());
        let problems = reconcile(&dialect, "target:\n  url: x\n  queue: y\n");
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.kind == ProblemKind::MutuallyExclusive));
    }

    #[test]
    fn test_failing_constraint_is_ignored() {
        let failing = |_: &DynamicSchemaContext<'_>,
                       _: &ConstraintTarget|
         -> Result<Vec<Problem>, crate::error::ConstraintError> {
            Err(crate::error::ConstraintError("boom".to_string()))
        };
        let dialect = Dialect::new("failing", bean("Root", vec![prop("a", atomic("A"))]))
            .require(failing);
        assert!(reconcile(&dialect, "a: 1\n").is_empty());
    }

    #[test]
    fn test_union_members_checked_after_inference() {
        let http = bean(
            "Http",
            vec![prop("url", atomic("Url")), prop("timeout", integer("Timeout", Some(0), None))],
        );
        let queue = bean("Queue", vec![prop("topic", atomic("Topic"))]);
        let root = bean(
            "Root",
            vec![prop("target", union("Target", vec![http, queue]).unwrap())],
        );
        let dialect = Dialect::new("union", root);

        assert!(reconcile(&dialect, "target:\n  timeout: 5\n").is_empty());
        let problems = reconcile(&dialect, "target:\n  topic: t\n  timeout: 5\n");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].message, "Unknown property 'timeout' for type 'Queue'");
    }

    #[test]
    fn test_syntax_error_and_damaged_block() {
        let text = "name: ok\napplications:\n- name: a\n  bogus: [1\n  memory: 1G\n";
        let problems = reconcile(&manifest(), text);
        assert!(problems.iter().any(|p| p.kind == ProblemKind::SyntaxError));
        let unknown: Vec<_> = problems
            .iter()
            .filter(|p| p.kind == ProblemKind::UnknownProperty)
            .collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].region.text(text), "bogus");
    }

    #[test]
    fn test_templated_values_are_skipped() {
        let text = "applications:\n- name: a\n  instances: ${count}\n";
        assert!(reconcile(&manifest(), text).is_empty());
    }
}
