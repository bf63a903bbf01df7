//! LLM provider factory.
//!
//! Builds a client for the configured provider, injecting endpoint, secret
//! and request timeout.

use crate::client::LlmClient;
use crate::providers::{openai::DEFAULT_OPENAI_ENDPOINT, MockClient, OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use lumen_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("openai", "ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required for openai)
/// * `timeout` - Per-request timeout
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// secret is missing, `AppError::Llm` if the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    tracing::debug!("Creating {} client", provider_type.as_str());

    match provider_type {
        ProviderType::OpenAI => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let base_url = endpoint.unwrap_or(DEFAULT_OPENAI_ENDPOINT);
            Ok(Arc::new(OpenAiClient::with_base_url(
                base_url, api_key, timeout,
            )?))
        }
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaClient::with_timeout(base_url, timeout)?))
        }
        ProviderType::Mock => Ok(Arc::new(MockClient::new())),
    }
}
