//! Prompt types.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// What the prompt is for
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Optional system template, rendered like `template` and placed before it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Output specification
    pub output: PromptOutputSpec,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format ("text" or "json")
    pub format: String,
}

/// A fully rendered prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// Main instruction
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: String,
        resolved_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                resolved_variables,
            },
        }
    }

    /// The system part, if any, followed by the main instruction.
    pub fn instruction(&self) -> String {
        match self.system.as_deref().filter(|s| !s.is_empty()) {
            Some(system) => format!("{}\n\n{}", system, self.user),
            None => self.user.clone(),
        }
    }
}
