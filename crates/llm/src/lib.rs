//! LLM integration crate for Lumen.
//!
//! This crate provides a provider-agnostic abstraction for chat completions
//! and structured extraction. It supports multiple providers through a
//! unified trait-based interface.
//!
//! # Providers
//! - **OpenAI**: any OpenAI-compatible `chat/completions` endpoint (default)
//! - **Ollama**: local LLM runtime
//! - **Mock**: scripted replies for tests and offline runs
//!
//! # Example
//! ```no_run
//! use lumen_llm::{ChatMessage, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("llama3.2", vec![ChatMessage::user("Hallo!")]);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod extract;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage, ResponseSchema,
};
pub use extract::{ExtractionRequest, Extractor, LlmExtractor};
pub use factory::create_client;
pub use providers::{MockClient, OllamaClient, OpenAiClient};
pub use types::ProviderType;
