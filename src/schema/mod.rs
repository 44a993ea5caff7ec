//! Schema model for YAML dialects

pub mod constraints;
pub mod context;
pub mod dialect;
pub mod loader;
pub mod property_index;
pub mod types;
pub mod workflows;

pub use context::DynamicSchemaContext;
pub use dialect::Dialect;
pub use loader::{load_dialect_file, load_dialect_file_with, load_dialect_str, load_dialect_str_with};
pub use types::{SchemaOptions, TypeUtil, YType, YTypedProperty, YValueHint};
pub use workflows::workflows_dialect;
