//! Schema type graph
//!
//! A dialect describes its documents as a graph of [`YType`]s built once and
//! shared read-only. Types are queried through [`TypeUtil`], never matched on
//! directly by the assist and reconcile layers, so a type can change its shape
//! depending on the [`DynamicSchemaContext`] it is looked at from.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::{SchemaLoadError, ValueParseError};
use crate::names::{canonical_name, relaxed_variants};
use crate::renderable::Renderable;

use super::constraints::Constraint;
use super::context::DynamicSchemaContext;

/// Checks a scalar value against an atomic type.
pub trait ValueParser: Send + Sync {
    fn parse(&self, value: &str, context: &DynamicSchemaContext<'_>) -> Result<(), ValueParseError>;
}

impl<F> ValueParser for F
where
    F: Fn(&str, &DynamicSchemaContext<'_>) -> Result<(), ValueParseError> + Send + Sync,
{
    fn parse(&self, value: &str, context: &DynamicSchemaContext<'_>) -> Result<(), ValueParseError> {
        self(value, context)
    }
}

/// Computes value hints from the surroundings of a node.
pub trait HintProvider: Send + Sync {
    fn hints(&self, context: &DynamicSchemaContext<'_>) -> Vec<YValueHint>;
}

impl<F> HintProvider for F
where
    F: Fn(&DynamicSchemaContext<'_>) -> Vec<YValueHint> + Send + Sync,
{
    fn hints(&self, context: &DynamicSchemaContext<'_>) -> Vec<YValueHint> {
        self(context)
    }
}

type TypeGuess = dyn Fn(&DynamicSchemaContext<'_>) -> Option<YType> + Send + Sync;

/// A value suggestion for an atomic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YValueHint {
    pub value: String,
    pub label: String,
    pub documentation: Option<Renderable>,
    /// Text inserted after the value, e.g. a nested block skeleton.
    pub extra_insertion: Option<String>,
}

impl YValueHint {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            documentation: None,
            extra_insertion: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_documentation(mut self, doc: impl Into<Renderable>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    pub fn with_extra_insertion(mut self, text: impl Into<String>) -> Self {
        self.extra_insertion = Some(text.into());
        self
    }
}

impl From<&str> for YValueHint {
    fn from(value: &str) -> Self {
        YValueHint::new(value)
    }
}

/// Which structural questions an uninferred context-sensitive type answers
/// with "yes".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub atomic: bool,
    pub map: bool,
    pub bean: bool,
    pub sequence: bool,
}

impl Shape {
    const ANYTHING: Shape = Shape {
        atomic: true,
        map: true,
        bean: true,
        sequence: true,
    };
}

#[derive(Clone)]
pub enum TypeKind {
    Atomic,
    Any,
    Map {
        key: YType,
        value: YType,
    },
    Bean {
        properties: Vec<YTypedProperty>,
    },
    Sequence {
        element: YType,
    },
    /// Beans told apart by a property only one of them declares.
    Union {
        members: Vec<YType>,
        primaries: Vec<YTypedProperty>,
    },
    ContextSensitive {
        guess: Arc<TypeGuess>,
        shape: Shape,
    },
    Forward(Arc<OnceLock<YType>>),
}

#[derive(Clone)]
struct TypeDef {
    name: String,
    kind: TypeKind,
    hints: Vec<YValueHint>,
    hint_provider: Option<Arc<dyn HintProvider>>,
    parser: Option<Arc<dyn ValueParser>>,
    constraints: Vec<Arc<dyn Constraint>>,
}

/// A node in a schema graph. Cloning shares the definition.
#[derive(Clone)]
pub struct YType(Arc<TypeDef>);

impl YType {
    fn of(name: impl Into<String>, kind: TypeKind) -> Self {
        YType(Arc::new(TypeDef {
            name: name.into(),
            kind,
            hints: Vec::new(),
            hint_provider: None,
            parser: None,
            constraints: Vec::new(),
        }))
    }

    fn modify(mut self, f: impl FnOnce(&mut TypeDef)) -> Self {
        f(Arc::make_mut(&mut self.0));
        self
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    /// Identity comparison; two separately built types are never equal.
    pub fn same(&self, other: &YType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn with_hints<H: Into<YValueHint>>(self, hints: impl IntoIterator<Item = H>) -> Self {
        self.modify(|def| def.hints.extend(hints.into_iter().map(Into::into)))
    }

    pub fn with_hint_provider<P: HintProvider + 'static>(self, provider: P) -> Self {
        self.modify(|def| def.hint_provider = Some(Arc::new(provider)))
    }

    pub fn parse_with<P: ValueParser + 'static>(self, parser: P) -> Self {
        self.modify(|def| def.parser = Some(Arc::new(parser)))
    }

    pub fn require<C: Constraint + 'static>(self, constraint: C) -> Self {
        self.modify(|def| def.constraints.push(Arc::new(constraint)))
    }

    /// Adds a property to a bean type.
    pub fn add_property(self, property: YTypedProperty) -> Self {
        self.modify(|def| {
            if let TypeKind::Bean { properties } = &mut def.kind {
                properties.push(property);
            }
        })
    }

    /// Restricts an uninferred context-sensitive type to scalar values.
    pub fn treat_as_atomic(self) -> Self {
        self.with_shape(Shape {
            atomic: true,
            map: false,
            bean: false,
            sequence: false,
        })
    }

    /// Restricts an uninferred context-sensitive type to mappings of properties.
    pub fn treat_as_bean(self) -> Self {
        self.with_shape(Shape {
            atomic: false,
            map: false,
            bean: true,
            sequence: false,
        })
    }

    fn with_shape(self, new_shape: Shape) -> Self {
        self.modify(|def| {
            if let TypeKind::ContextSensitive { shape, .. } = &mut def.kind {
                *shape = new_shape;
            }
        })
    }

    /// Binds a forward reference created by [`forward`].
    pub fn define(&self, target: YType) -> Result<(), SchemaLoadError> {
        match self.kind() {
            TypeKind::Forward(cell) => cell.set(target).map_err(|_| {
                SchemaLoadError::InvalidType(self.name().to_string(), "defined twice".to_string())
            }),
            _ => Err(SchemaLoadError::InvalidType(
                self.name().to_string(),
                "not a forward reference".to_string(),
            )),
        }
    }
}

impl PartialEq for YType {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Display for YType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for YType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YType({})", self.name())
    }
}

/// A named, typed slot of a bean.
#[derive(Debug, Clone)]
pub struct YTypedProperty {
    name: String,
    ty: YType,
    description: Renderable,
    aliases: Vec<String>,
    required: bool,
    primary: bool,
    deprecated: bool,
    deprecation_message: Option<String>,
}

impl YTypedProperty {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &YType {
        &self.ty
    }

    pub fn description(&self) -> &Renderable {
        &self.description
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn deprecation_message(&self) -> Option<&str> {
        self.deprecation_message.as_deref()
    }

    pub fn with_description(mut self, description: impl Into<Renderable>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn deprecated(mut self, message: Option<&str>) -> Self {
        self.deprecated = true;
        self.deprecation_message = message.map(str::to_string);
        self
    }

    /// Whether `key` names this property, by declared name or alias.
    pub fn is_named(&self, key: &str) -> bool {
        self.name == key || self.aliases.iter().any(|a| a == key)
    }

    /// Declared name and its relaxed variants, then the aliases whose
    /// canonical form none of these already covers.
    pub fn spellings(&self) -> Vec<String> {
        let mut spellings = relaxed_variants(&self.name);
        for alias in &self.aliases {
            let canonical = canonical_name(alias);
            if !spellings.iter().any(|s| canonical_name(s) == canonical) {
                spellings.push(alias.clone());
            }
        }
        spellings
    }
}

/// Creates a property.
pub fn prop(name: impl Into<String>, ty: YType) -> YTypedProperty {
    YTypedProperty {
        name: name.into(),
        ty,
        description: Renderable::Empty,
        aliases: Vec::new(),
        required: false,
        primary: false,
        deprecated: false,
        deprecation_message: None,
    }
}

// --- factory ---------------------------------------------------------------

/// A scalar type, validated by whatever parser is attached.
pub fn atomic(name: impl Into<String>) -> YType {
    YType::of(name, TypeKind::Atomic)
}

/// Accepts any value.
pub fn any(name: impl Into<String>) -> YType {
    YType::of(name, TypeKind::Any)
}

pub fn map(key: YType, value: YType) -> YType {
    let name = format!("Map<{}, {}>", key.name(), value.name());
    YType::of(name, TypeKind::Map { key, value })
}

pub fn bean(name: impl Into<String>, properties: Vec<YTypedProperty>) -> YType {
    YType::of(name, TypeKind::Bean { properties })
}

pub fn sequence(element: YType) -> YType {
    let name = format!("List<{}>", element.name());
    YType::of(name, TypeKind::Sequence { element })
}

/// A union of beans. Each member needs a property no other member declares;
/// the first such property becomes the member's primary property.
pub fn union(name: impl Into<String>, members: Vec<YType>) -> Result<YType, SchemaLoadError> {
    let name = name.into();
    if members.len() < 2 {
        return Err(SchemaLoadError::InvalidType(
            name,
            "a union needs at least two members".to_string(),
        ));
    }
    let mut primaries = Vec::with_capacity(members.len());
    for member in &members {
        let TypeKind::Bean { properties } = member.kind() else {
            return Err(SchemaLoadError::InvalidType(
                name,
                format!("union member '{member}' is not a bean"),
            ));
        };
        let unique = properties.iter().find(|p| {
            members
                .iter()
                .filter(|other| !other.same(member))
                .all(|other| match other.kind() {
                    TypeKind::Bean { properties } => !properties.iter().any(|q| q.name == p.name),
                    _ => true,
                })
        });
        match unique {
            Some(p) => primaries.push(p.clone().primary()),
            None => {
                return Err(SchemaLoadError::InvalidType(
                    name,
                    format!("union member '{member}' has no unique property"),
                ))
            }
        }
    }
    Ok(YType::of(name, TypeKind::Union { members, primaries }))
}

/// A type whose concrete shape is guessed from its dynamic context. Until a
/// guess succeeds it accepts any shape.
pub fn context_aware<F>(name: impl Into<String>, guess: F) -> YType
where
    F: Fn(&DynamicSchemaContext<'_>) -> Option<YType> + Send + Sync + 'static,
{
    YType::of(
        name,
        TypeKind::ContextSensitive {
            guess: Arc::new(guess),
            shape: Shape::ANYTHING,
        },
    )
}

/// A placeholder bound later with [`YType::define`], for recursive schemas.
pub fn forward(name: impl Into<String>) -> YType {
    YType::of(name, TypeKind::Forward(Arc::new(OnceLock::new())))
}

pub fn boolean() -> YType {
    enumeration("boolean", &["true", "false"])
}

/// Integer values, optionally bounded (inclusive).
pub fn integer(name: impl Into<String>, min: Option<i64>, max: Option<i64>) -> YType {
    atomic(name).parse_with(move |value: &str, _: &DynamicSchemaContext<'_>| -> Result<(), ValueParseError> {
        let n: i64 = value
            .trim()
            .parse()
            .map_err(|_| ValueParseError::new(format!("'{value}' is not a valid integer")))?;
        if let Some(min) = min {
            if n < min {
                return Err(ValueParseError::new(format!(
                    "Value must be at least {min}"
                )));
            }
        }
        if let Some(max) = max {
            if n > max {
                return Err(ValueParseError::new(format!("Value must be at most {max}")));
            }
        }
        Ok(())
    })
}

pub fn enumeration(name: impl Into<String>, values: &[&str]) -> YType {
    EnumTypeBuilder::new(name, values).build()
}

#[derive(Debug, Clone)]
struct EnumDeprecation {
    value: String,
    message: String,
    replacement: Option<String>,
}

/// Builds an enumeration whose deprecated values are still accepted but
/// reported and no longer suggested.
#[derive(Debug, Clone)]
pub struct EnumTypeBuilder {
    name: String,
    values: Vec<String>,
    deprecations: Vec<EnumDeprecation>,
}

impl EnumTypeBuilder {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
            deprecations: Vec::new(),
        }
    }

    pub fn deprecate(mut self, value: &str, message: impl Into<String>) -> Self {
        self.deprecations.push(EnumDeprecation {
            value: value.to_string(),
            message: message.into(),
            replacement: None,
        });
        self
    }

    pub fn deprecate_with_replacement(mut self, value: &str, replacement: &str) -> Self {
        self.deprecations.push(EnumDeprecation {
            value: value.to_string(),
            message: format!("The value '{value}' is deprecated in favor of '{replacement}'"),
            replacement: Some(replacement.to_string()),
        });
        self
    }

    pub fn build(self) -> YType {
        let hints: Vec<YValueHint> = self
            .values
            .iter()
            .filter(|v| !self.deprecations.iter().any(|d| &d.value == *v))
            .map(|v| YValueHint::new(v.as_str()))
            .collect();
        let name = self.name.clone();
        let values = self.values;
        let deprecations = self.deprecations;
        atomic(name.clone())
            .with_hints(hints)
            .parse_with(move |value: &str, _: &DynamicSchemaContext<'_>| -> Result<(), ValueParseError> {
                if !values.iter().any(|v| v == value) {
                    return Err(ValueParseError::new(format!(
                        "'{value}' is an unknown '{name}'. Valid values are: [{}]",
                        values.join(", ")
                    )));
                }
                match deprecations.iter().find(|d| d.value == value) {
                    Some(d) => Err(ValueParseError::deprecated(
                        d.message.clone(),
                        d.replacement.clone(),
                    )),
                    None => Ok(()),
                }
            })
    }
}

// --- queries ---------------------------------------------------------------

/// Options that change how a dialect's types are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Propose optional properties only after the required ones are present.
    pub tiered_optional_proposals: bool,
    pub suggest_deprecated_properties: bool,
    /// Match keys against property names ignoring case, `-` and `_`.
    pub relaxed_names: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            tiered_optional_proposals: true,
            suggest_deprecated_properties: false,
            relaxed_names: false,
        }
    }
}

/// Interprets [`YType`]s.
#[derive(Debug, Clone, Default)]
pub struct TypeUtil {
    options: SchemaOptions,
}

const MAX_INFERENCE_STEPS: usize = 32;

impl TypeUtil {
    pub fn new(options: SchemaOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn tiered_optional_proposals(&self) -> bool {
        self.options.tiered_optional_proposals
    }

    pub fn suggest_deprecated_properties(&self) -> bool {
        self.options.suggest_deprecated_properties
    }

    pub fn relaxed_names(&self) -> bool {
        self.options.relaxed_names
    }

    /// Follows forward references. An unbound reference resolves to itself.
    pub fn resolve(&self, ty: &YType) -> YType {
        let mut current = ty.clone();
        for _ in 0..MAX_INFERENCE_STEPS {
            match current.kind() {
                TypeKind::Forward(cell) => match cell.get() {
                    Some(target) => current = target.clone(),
                    None => return current,
                },
                _ => return current,
            }
        }
        current
    }

    pub fn is_atomic(&self, ty: &YType) -> bool {
        match self.resolve(ty).kind() {
            TypeKind::Atomic | TypeKind::Any => true,
            TypeKind::ContextSensitive { shape, .. } => shape.atomic,
            _ => false,
        }
    }

    pub fn is_map(&self, ty: &YType) -> bool {
        match self.resolve(ty).kind() {
            TypeKind::Map { .. } | TypeKind::Any => true,
            TypeKind::ContextSensitive { shape, .. } => shape.map,
            _ => false,
        }
    }

    pub fn is_bean(&self, ty: &YType) -> bool {
        match self.resolve(ty).kind() {
            TypeKind::Bean { .. } | TypeKind::Union { .. } => true,
            TypeKind::ContextSensitive { shape, .. } => shape.bean,
            _ => false,
        }
    }

    pub fn is_sequence(&self, ty: &YType) -> bool {
        match self.resolve(ty).kind() {
            TypeKind::Sequence { .. } | TypeKind::Any => true,
            TypeKind::ContextSensitive { shape, .. } => shape.sequence,
            _ => false,
        }
    }

    /// Accepts any value; nothing below it is checked.
    pub fn is_any(&self, ty: &YType) -> bool {
        matches!(self.resolve(ty).kind(), TypeKind::Any)
    }

    pub fn is_union(&self, ty: &YType) -> bool {
        matches!(self.resolve(ty).kind(), TypeKind::Union { .. })
    }

    /// Properties a bean offers. An undiscriminated union offers only the
    /// primary properties of its members.
    pub fn properties_of(&self, ty: &YType) -> Vec<YTypedProperty> {
        match self.resolve(ty).kind() {
            TypeKind::Bean { properties } => properties.clone(),
            TypeKind::Union { primaries, .. } => primaries.clone(),
            _ => Vec::new(),
        }
    }

    /// Looks up a property by key: exact name, then alias, then (with
    /// relaxed names) canonical form.
    pub fn property(&self, ty: &YType, key: &str) -> Option<YTypedProperty> {
        let properties = self.properties_of(ty);
        if let Some(p) = properties.iter().find(|p| p.name == key) {
            return Some(p.clone());
        }
        if let Some(p) = properties.iter().find(|p| p.is_named(key)) {
            return Some(p.clone());
        }
        if self.options.relaxed_names {
            let canonical = canonical_name(key);
            return properties
                .into_iter()
                .find(|p| canonical_name(&p.name) == canonical);
        }
        None
    }

    /// Every type `key` could select: for a union, the matching property of
    /// each member declaring it.
    pub fn property_types(&self, ty: &YType, key: &str) -> Vec<YType> {
        let resolved = self.resolve(ty);
        match resolved.kind() {
            TypeKind::Union { members, .. } => members
                .iter()
                .filter_map(|m| self.property(m, key))
                .map(|p| p.ty)
                .collect(),
            _ => self.property(&resolved, key).map(|p| p.ty).into_iter().collect(),
        }
    }

    pub fn union_members(&self, ty: &YType) -> Vec<YType> {
        match self.resolve(ty).kind() {
            TypeKind::Union { members, .. } => members.clone(),
            _ => Vec::new(),
        }
    }

    /// Element type of a sequence or value type of a map.
    pub fn domain_type(&self, ty: &YType) -> Option<YType> {
        match self.resolve(ty).kind() {
            TypeKind::Sequence { element } => Some(element.clone()),
            TypeKind::Map { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn element_type_of(&self, ty: &YType) -> Option<YType> {
        match self.resolve(ty).kind() {
            TypeKind::Sequence { element } => Some(element.clone()),
            _ => None,
        }
    }

    pub fn key_type(&self, ty: &YType) -> Option<YType> {
        match self.resolve(ty).kind() {
            TypeKind::Map { key, .. } => Some(key.clone()),
            _ => None,
        }
    }

    pub fn value_parser_of(&self, ty: &YType) -> Option<Arc<dyn ValueParser>> {
        self.resolve(ty).0.parser.clone()
    }

    /// Static hints first, then provider hints, without duplicates.
    pub fn hints_of(&self, ty: &YType, context: &DynamicSchemaContext<'_>) -> Vec<YValueHint> {
        let resolved = self.resolve(ty);
        let mut hints = resolved.0.hints.clone();
        if let Some(provider) = &resolved.0.hint_provider {
            for hint in provider.hints(context) {
                if !hints.iter().any(|h| h.value == hint.value) {
                    hints.push(hint);
                }
            }
        }
        hints
    }

    pub fn constraints_of(&self, ty: &YType) -> Vec<Arc<dyn Constraint>> {
        self.resolve(ty).0.constraints.clone()
    }

    /// Replaces a type by what the context says it really is, until that no
    /// longer changes.
    pub fn infer_more_specific_type(&self, ty: &YType, context: &DynamicSchemaContext<'_>) -> YType {
        let mut current = self.resolve(ty);
        for _ in 0..MAX_INFERENCE_STEPS {
            let better = match current.kind() {
                TypeKind::Union { members, primaries } => {
                    let defined = context.defined_properties();
                    members
                        .iter()
                        .zip(primaries)
                        .find(|(_, p)| {
                            defined.iter().any(|key| {
                                p.name == *key
                                    || (self.options.relaxed_names
                                        && canonical_name(&p.name) == canonical_name(key))
                            })
                        })
                        .map(|(m, _)| m.clone())
                }
                TypeKind::ContextSensitive { guess, .. } => guess(context),
                _ => None,
            };
            match better {
                Some(better) => {
                    let better = self.resolve(&better);
                    if better.same(&current) {
                        break;
                    }
                    debug!("Inferred {} as {}", current, better);
                    current = better;
                }
                None => break,
            }
        }
        current
    }

    pub fn nice_type_name(&self, ty: &YType) -> String {
        self.resolve(ty).name().to_string()
    }
}
