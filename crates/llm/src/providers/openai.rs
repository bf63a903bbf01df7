//! OpenAI-compatible chat completions provider.
//!
//! Structured output uses `response_format: {"type": "json_schema", ...}`
//! in strict mode.

use crate::client::{status_error, ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use lumen_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for OpenAI and API-compatible servers.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client against the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        Self::with_base_url(DEFAULT_OPENAI_ENDPOINT, api_key, timeout)
    }

    /// Create a client against a custom endpoint (e.g. a proxy or Azure gateway).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    fn to_openai_request(&self, request: &LlmRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.full_messages(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.response_schema.as_ref().map(|rs| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": rs.name,
                        "strict": true,
                        "schema": rs.schema,
                    }
                })
            }),
        }
    }

    fn convert_response(&self, response: ChatCompletionResponse) -> AppResult<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("OpenAI response contained no choices".to_string()))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(AppError::Llm(format!("Model refused the request: {}", refusal)));
        }

        let content = choice
            .message
            .content
            .ok_or_else(|| AppError::Llm("OpenAI response message has no content".to_string()))?;

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: response.model,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending chat completion request to OpenAI");
        tracing::debug!("Request: {:?}", request);

        let body = self.to_openai_request(request);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to OpenAI: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error("OpenAI", status, &error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse OpenAI response: {}", e)))?;

        tracing::info!("Received completion from OpenAI");
        tracing::debug!("Response: {:?}", completion);

        self.convert_response(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResponseSchema;

    fn client() -> OpenAiClient {
        OpenAiClient::new("sk-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_shape_with_schema() {
        let request = LlmRequest::new("gpt-4o", vec![ChatMessage::user("Wie viel wiegt XBO?")])
            .with_temperature(0.0)
            .with_response_schema(ResponseSchema {
                name: "chat_mode".to_string(),
                schema: serde_json::json!({"type": "object"}),
            });

        let body = serde_json::to_value(client().to_openai_request(&request)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "chat_mode");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_request_without_schema_omits_format() {
        let request = LlmRequest::new("gpt-4o", vec![ChatMessage::user("Hallo")]);
        let body = serde_json::to_value(client().to_openai_request(&request)).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_convert_response() {
        let raw = r#"{
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Guten Tag!"}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 4, "total_tokens": 24}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();

        let response = client().convert_response(parsed).unwrap();
        assert_eq!(response.content, "Guten Tag!");
        assert_eq!(response.usage.total_tokens, 24);
    }

    #[test]
    fn test_convert_response_refusal() {
        let raw = r#"{"model": "gpt-4o", "choices": [{"message": {"content": null, "refusal": "nope"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();

        assert!(matches!(
            client().convert_response(parsed),
            Err(AppError::Llm(_))
        ));
    }

    #[test]
    fn test_convert_response_no_choices() {
        let raw = r#"{"model": "gpt-4o", "choices": []}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(client().convert_response(parsed).is_err());
    }
}
