//! Editing assistance: completion and hover driven by a dialect's types

pub mod completion;
pub mod context;
pub mod fuzzy;
pub mod hover;

pub use completion::{Completion, CompletionEngine, CompletionKind};
pub use context::{AssistContext, AssistSource};
pub use hover::{Hover, HoverEngine};
