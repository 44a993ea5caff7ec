//! Dialects declared in YAML
//!
//! A dialect file names its types, the root type, the file patterns it
//! applies to and optional constraints:
//!
//! ```yaml
//! name: manifest
//! files: ['manifest\.ya?ml$']
//! root: Manifest
//! types:
//!   - name: Manifest
//!     kind: bean
//!     properties:
//!       - name: applications
//!         type: Applications
//!         required: true
//!   - name: Applications
//!     kind: sequence
//!     element: Application
//!   - name: Application
//!     kind: bean
//!     properties:
//!       - { name: name, type: String, required: true, description: Application name. }
//!       - { name: memory, type: String, hints: [512M, 1G] }
//!     constraints:
//!       - require_at_most_one_of: [buildpack, docker]
//! ```
//!
//! Types may refer to each other in any order; references are resolved
//! through forward types. A type of kind `indexed` takes its values from the
//! property index handed to [`load_dialect_str_with`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SchemaLoadError;

use super::constraints::{deprecated, require_at_most_one_of, require_one_of, Constraint};
use super::dialect::Dialect;
use super::property_index::{indexed_type, NoIndex, PropertyLookup};
use super::types::{
    any, atomic, bean, boolean, forward, integer, map, prop, sequence, union, EnumTypeBuilder,
    YType, YTypedProperty,
};

#[derive(Debug, Deserialize)]
struct DialectFile {
    name: String,
    #[serde(default)]
    files: Vec<String>,
    root: String,
    #[serde(default)]
    types: Vec<TypeDecl>,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    constraints: Vec<ConstraintDecl>,
}

#[derive(Debug, Deserialize)]
struct TypeDecl {
    name: String,
    #[serde(flatten)]
    kind: KindDecl,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    constraints: Vec<ConstraintDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum KindDecl {
    Atomic,
    Any,
    Bean {
        #[serde(default)]
        properties: Vec<PropertyDecl>,
    },
    Map {
        key: String,
        value: String,
    },
    Sequence {
        element: String,
    },
    Union {
        members: Vec<String>,
    },
    Enum {
        values: Vec<String>,
        #[serde(default)]
        deprecated: BTreeMap<String, ValueDeprecation>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Indexed,
}

#[derive(Debug, Default, Deserialize)]
struct ValueDeprecation {
    message: Option<String>,
    replacement: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PropertyDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    required: bool,
    description: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    deprecated: Option<PropertyDeprecation>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PropertyDeprecation {
    Flag(bool),
    Message(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ConstraintDecl {
    RequireOneOf(Vec<String>),
    RequireAtMostOneOf(Vec<String>),
    /// `{name}` in the message is replaced by the property name.
    Deprecated {
        properties: Vec<String>,
        message: String,
    },
}

impl ConstraintDecl {
    fn build(&self) -> Box<dyn Constraint> {
        match self {
            ConstraintDecl::RequireOneOf(names) => Box::new(require_one_of(&as_strs(names))),
            ConstraintDecl::RequireAtMostOneOf(names) => {
                Box::new(require_at_most_one_of(&as_strs(names)))
            }
            ConstraintDecl::Deprecated {
                properties,
                message,
            } => {
                let template = message.clone();
                Box::new(deprecated(
                    move |name: &str| template.replace("{name}", name),
                    &as_strs(properties),
                ))
            }
        }
    }
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

fn builtin(name: &str) -> Option<YType> {
    match name {
        "String" | "string" => Some(atomic("String")),
        "Number" | "number" => Some(atomic("Number")),
        "boolean" | "Boolean" => Some(boolean()),
        "integer" | "Integer" => Some(integer("integer", None, None)),
        "any" | "Any" => Some(any("Any")),
        _ => None,
    }
}

struct TypeResolver {
    forwards: HashMap<String, YType>,
    built: HashMap<String, YType>,
    index: Arc<dyn PropertyLookup>,
}

impl TypeResolver {
    fn reference(&self, name: &str, from: &str) -> Result<YType, SchemaLoadError> {
        if let Some(ty) = self.forwards.get(name) {
            return Ok(ty.clone());
        }
        builtin(name).ok_or_else(|| SchemaLoadError::UnknownType {
            name: name.to_string(),
            from: from.to_string(),
        })
    }

    fn property(&self, decl: &PropertyDecl, owner: &str) -> Result<YTypedProperty, SchemaLoadError> {
        let mut p = prop(decl.name.clone(), self.reference(&decl.ty, owner)?);
        if decl.required {
            p = p.required();
        }
        if let Some(description) = &decl.description {
            p = p.with_description(description.as_str());
        }
        for alias in &decl.aliases {
            p = p.with_alias(alias.clone());
        }
        match &decl.deprecated {
            Some(PropertyDeprecation::Flag(true)) => p = p.deprecated(None),
            Some(PropertyDeprecation::Message(message)) => p = p.deprecated(Some(message)),
            Some(PropertyDeprecation::Flag(false)) | None => {}
        }
        Ok(p)
    }

    fn build(&self, decl: &TypeDecl) -> Result<YType, SchemaLoadError> {
        let name = decl.name.as_str();
        let ty = match &decl.kind {
            KindDecl::Atomic => atomic(name),
            KindDecl::Any => any(name),
            KindDecl::Bean { properties } => bean(
                name,
                properties
                    .iter()
                    .map(|p| self.property(p, name))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            KindDecl::Map { key, value } => {
                map(self.reference(key, name)?, self.reference(value, name)?)
            }
            KindDecl::Sequence { element } => sequence(self.reference(element, name)?),
            KindDecl::Union { members } => {
                let members = members
                    .iter()
                    .map(|m| {
                        self.built.get(m).cloned().ok_or_else(|| {
                            SchemaLoadError::InvalidType(
                                name.to_string(),
                                format!("union member '{m}' must be a bean declared before the union"),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                union(name, members)?
            }
            KindDecl::Enum { values, deprecated } => {
                let mut builder = EnumTypeBuilder::new(name, &as_strs(values));
                for (value, deprecation) in deprecated {
                    if !values.contains(value) {
                        return Err(SchemaLoadError::InvalidType(
                            name.to_string(),
                            format!("deprecated value '{value}' is not one of the values"),
                        ));
                    }
                    builder = match (&deprecation.replacement, &deprecation.message) {
                        (Some(replacement), _) => {
                            builder.deprecate_with_replacement(value, replacement)
                        }
                        (None, Some(message)) => builder.deprecate(value, message.clone()),
                        (None, None) => {
                            builder.deprecate(value, format!("The value '{value}' is deprecated"))
                        }
                    };
                }
                builder.build()
            }
            KindDecl::Integer { min, max } => integer(name, *min, *max),
            KindDecl::Indexed => indexed_type(name, Arc::clone(&self.index)),
        };
        let ty = ty.with_hints(decl.hints.iter().map(String::as_str));
        Ok(decl
            .constraints
            .iter()
            .fold(ty, |ty, c| ty.require(BoxedConstraint(c.build()))))
    }
}

struct BoxedConstraint(Box<dyn Constraint>);

impl Constraint for BoxedConstraint {
    fn verify(
        &self,
        context: &super::context::DynamicSchemaContext<'_>,
        target: &super::constraints::ConstraintTarget,
    ) -> Result<Vec<crate::diagnostics::problems::Problem>, crate::error::ConstraintError> {
        self.0.verify(context, target)
    }
}

/// Parses a dialect definition. `indexed` types accept any value.
pub fn load_dialect_str(text: &str) -> Result<Dialect, SchemaLoadError> {
    load_dialect_str_with(text, Arc::new(NoIndex))
}

/// Parses a dialect definition whose `indexed` types read `index`.
pub fn load_dialect_str_with(
    text: &str,
    index: Arc<dyn PropertyLookup>,
) -> Result<Dialect, SchemaLoadError> {
    let file: DialectFile = serde_yaml::from_str(text)?;
    let mut resolver = TypeResolver {
        forwards: HashMap::new(),
        built: HashMap::new(),
        index,
    };
    for decl in &file.types {
        if resolver.forwards.contains_key(&decl.name) {
            return Err(SchemaLoadError::InvalidType(
                decl.name.clone(),
                "declared twice".to_string(),
            ));
        }
        resolver
            .forwards
            .insert(decl.name.clone(), forward(decl.name.clone()));
    }
    for decl in &file.types {
        let ty = resolver.build(decl)?;
        if let Some(placeholder) = resolver.forwards.get(&decl.name) {
            placeholder.define(ty.clone())?;
        }
        debug!("Loaded type {} for dialect {}", decl.name, file.name);
        resolver.built.insert(decl.name.clone(), ty);
    }

    let root = match resolver.built.get(&file.root) {
        Some(ty) => ty.clone(),
        None => resolver.reference(&file.root, &file.name)?,
    };
    let mut dialect = Dialect::new(file.name.clone(), root);
    for pattern in &file.files {
        dialect = dialect.with_file_pattern(pattern)?;
    }
    for constraint in &file.constraints {
        dialect = dialect.require(BoxedConstraint(constraint.build()));
    }
    info!(
        "Loaded dialect {} ({} types)",
        dialect.name(),
        file.types.len()
    );
    Ok(dialect)
}

/// Reads and parses a dialect file.
pub fn load_dialect_file(path: &Path) -> Result<Dialect, SchemaLoadError> {
    load_dialect_file_with(path, Arc::new(NoIndex))
}

pub fn load_dialect_file_with(
    path: &Path,
    index: Arc<dyn PropertyLookup>,
) -> Result<Dialect, SchemaLoadError> {
    let text = std::fs::read_to_string(path)?;
    load_dialect_str_with(&text, index)
}
