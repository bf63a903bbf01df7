//! Prompt system for Lumen.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions, built in or per workspace
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
