//! Conversation routing for Lumen.
//!
//! Each user turn runs through a small state machine: classify the
//! conversation, look up the catalog when the question needs product data,
//! then generate the reply. Model access is injected through the
//! [`lumen_llm::Extractor`] and [`lumen_llm::LlmClient`] traits.

pub mod mode;
pub mod router;
pub mod state;

pub use mode::ChatMode;
pub use router::{ModeRouter, RouterPrompts, RouterSettings};
pub use state::{Retrieval, TurnState};
