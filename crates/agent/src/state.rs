//! Per-turn state threaded through the router steps.

use crate::mode::ChatMode;
use lumen_catalog::{FilterSpec, Record};
use lumen_llm::ChatMessage;

/// What the retrieval step found.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    /// Criteria extracted from the conversation
    pub spec: FilterSpec,

    /// Matching records in catalog order; empty means no results
    pub matches: Vec<Record>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Everything one turn knows. Each step takes it by value and returns it.
#[derive(Debug, Clone)]
pub struct TurnState {
    /// Conversation so far, oldest first; the last entry is the new user turn
    pub messages: Vec<ChatMessage>,

    pub mode: ChatMode,

    /// Set by the retrieval step
    pub retrieval: Option<Retrieval>,

    /// Set by the response step
    pub response: Option<String>,
}

impl TurnState {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            mode: ChatMode::default(),
            retrieval: None,
            response: None,
        }
    }

    /// Final reply text, empty until the response step has run.
    pub fn answer(&self) -> &str {
        self.response.as_deref().unwrap_or_default()
    }

    /// Records the answer was based on.
    pub fn matches(&self) -> &[Record] {
        self.retrieval
            .as_ref()
            .map(|r| r.matches.as_slice())
            .unwrap_or_default()
    }
}
