//! Chat modes and their classification schema.

use lumen_core::{AppError, AppResult};
use lumen_llm::ResponseSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Which path a turn takes through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMode {
    /// Answer from the conversation alone
    #[default]
    ChitChat,
    /// Look up the catalog before answering
    Retrieval,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChitChat => "chit-chat",
            Self::Retrieval => "retrieval",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "chit-chat" => Ok(Self::ChitChat),
            "retrieval" => Ok(Self::Retrieval),
            other => Err(AppError::Extraction(format!("Unknown chat mode: '{}'", other))),
        }
    }

    /// Two-valued classification schema for the `chat_mode` extraction.
    pub fn response_schema() -> ResponseSchema {
        ResponseSchema {
            name: "chat_mode".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "chat_mode": {
                        "type": "string",
                        "enum": [Self::ChitChat.as_str(), Self::Retrieval.as_str()],
                        "description": "Der Modus, in den der Chatbot basierend auf der Chat Historie gehen soll."
                    }
                },
                "required": ["chat_mode"],
                "additionalProperties": false
            }),
        }
    }

    /// Read the mode out of a `chat_mode` extraction result.
    pub fn from_extraction(value: &serde_json::Value) -> AppResult<Self> {
        let label = value
            .get("chat_mode")
            .and_then(|m| m.as_str())
            .ok_or_else(|| AppError::Extraction(format!("No chat_mode in {}", value)))?;
        Self::parse(label)
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
