//! yaml-assist-lsp: schema-driven editing assistance for YAML files
//!
//! This library provides the core functionality for the yaml-assist-lsp server:
//! - Error-tolerant YAML structure parsing and a recovered AST
//! - Schema types, dialects and constraints describing valid documents
//! - Completion and hover driven by the schema
//! - Reconciling documents against their schema into problems
//!
//! # Example
//!
//! ```
//! use yaml_assist_lsp::config::EngineConfig;
//! use yaml_assist_lsp::engine::YamlEngine;
//! use yaml_assist_lsp::schema::load_dialect_str;
//!
//! let dialect = load_dialect_str(
//!     "name: service\nfiles: ['\\.service\\.ya?ml$']\nroot: Service\ntypes:\n  - name: Service\n    kind: bean\n    properties:\n      - name: name\n        type: String\n        required: true\n",
//! )
//! .unwrap();
//! let engine = YamlEngine::new(dialect, EngineConfig::default());
//!
//! let problems = engine.reconcile("name: api\nblah: 1\n");
//! assert_eq!(problems.len(), 1);
//!
//! let completions = engine.complete("", 0);
//! assert_eq!(completions[0].label, "name");
//! ```

pub mod assist;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod error;
pub mod names;
pub mod parser;
pub mod path;
pub mod renderable;
pub mod schema;
pub mod text;

mod backend;

pub use backend::Backend;
