//! Structured extraction on top of a chat model.
//!
//! An [`Extractor`] turns a conversation plus a JSON Schema into a JSON value
//! that conforms to that schema's top level. The router depends only on the
//! trait, so tests substitute deterministic stubs.

use crate::client::{ChatMessage, LlmClient, LlmRequest, ResponseSchema};
use lumen_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// What to extract and from which conversation.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Target schema
    pub schema: ResponseSchema,

    /// Prompt and context, oldest first
    pub messages: Vec<ChatMessage>,
}

impl ExtractionRequest {
    pub fn new(schema: ResponseSchema, messages: Vec<ChatMessage>) -> Self {
        Self { schema, messages }
    }
}

/// Capability: structured output from natural language.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Extract a JSON object conforming to `request.schema`.
    ///
    /// # Errors
    /// `AppError::Extraction` when no conforming object could be produced,
    /// `AppError::LlmRejected` when the provider refuses the request outright.
    async fn extract(&self, request: &ExtractionRequest) -> AppResult<serde_json::Value>;
}

/// [`Extractor`] backed by an [`LlmClient`], with bounded retries.
pub struct LlmExtractor {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_retries: u32,
    backoff: Duration,
}

impl LlmExtractor {
    /// Create an extractor with temperature 0 and two retries.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.0,
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Base delay before the first retry; doubles on every further retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn attempt(&self, request: &ExtractionRequest) -> AppResult<serde_json::Value> {
        let llm_request = LlmRequest::new(&self.model, request.messages.clone())
            .with_temperature(self.temperature)
            .with_response_schema(request.schema.clone());

        let response = self.client.complete(&llm_request).await?;

        let value: serde_json::Value = serde_json::from_str(strip_code_fence(&response.content))
            .map_err(|e| AppError::Extraction(format!("Model output is not valid JSON: {}", e)))?;

        validate_structure(&request.schema.schema, &value).map_err(AppError::Extraction)?;

        Ok(value)
    }
}

#[async_trait::async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> AppResult<serde_json::Value> {
        let attempts = self.max_retries.saturating_add(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff * 2u32.saturating_pow((attempt - 1).min(5));
                tracing::warn!(
                    "Retrying '{}' extraction in {:?} (attempt {}/{})",
                    request.schema.name,
                    delay,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(request).await {
                Ok(value) => {
                    tracing::debug!("Extracted '{}': {}", request.schema.name, value);
                    return Ok(value);
                }
                // Transient provider failures and malformed output are worth another try;
                // rejected requests and everything else fail at once
                Err(e @ (AppError::Llm(_) | AppError::Extraction(_))) => {
                    tracing::warn!("Extraction attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Extraction(format!(
            "'{}' failed after {} attempt(s): {}",
            request.schema.name,
            attempts,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

/// Remove a surrounding Markdown code fence, which some local models add.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Check `value` against the top level of a JSON Schema object.
///
/// Covers object type, `required`, `additionalProperties: false` and `enum`
/// on properties. Nested structure is left to the typed parse downstream.
pub fn validate_structure(
    schema: &serde_json::Value,
    value: &serde_json::Value,
) -> Result<(), String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("Expected a JSON object, got {}", value))?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !object.contains_key(key) {
                return Err(format!("Missing required field '{}'", key));
            }
        }
    }

    let properties = schema.get("properties").and_then(|p| p.as_object());

    if schema.get("additionalProperties") == Some(&serde_json::Value::Bool(false)) {
        if let Some(properties) = properties {
            if let Some(extra) = object.keys().find(|k| !properties.contains_key(*k)) {
                return Err(format!("Unexpected field '{}'", extra));
            }
        }
    }

    if let Some(properties) = properties {
        for (name, property) in properties {
            let (Some(allowed), Some(actual)) = (
                property.get("enum").and_then(|e| e.as_array()),
                object.get(name),
            ) else {
                continue;
            };
            if !actual.is_null() && !allowed.contains(actual) {
                return Err(format!(
                    "Field '{}' has value {} outside of {}",
                    name,
                    actual,
                    serde_json::Value::Array(allowed.clone())
                ));
            }
        }
    }

    Ok(())
}
