//! Mock provider with scripted replies.

use crate::client::{ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use lumen_core::AppResult;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Deterministic provider for tests and offline runs.
///
/// Scripted replies are returned in order. Once they run out, requests with a
/// response schema get an object whose enum properties take their first
/// allowed value and every other property is null; plain requests get the
/// last user message echoed back.
#[derive(Debug, Default)]
pub struct MockClient {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockClient {
    /// Create a mock provider with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider that answers with `replies`, in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn default_reply(request: &LlmRequest) -> String {
        match request.response_schema {
            Some(ref rs) => null_object(&rs.schema).to_string(),
            None => request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::User)
                .map(|m| m.content.clone())
                .unwrap_or_default(),
        }
    }
}

/// Object for `schema` with enum properties at their first value and the rest null.
fn null_object(schema: &serde_json::Value) -> serde_json::Value {
    let mut object = serde_json::Map::new();

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, property) in properties {
            let value = property
                .get("enum")
                .and_then(|e| e.as_array())
                .and_then(|values| values.first().cloned())
                .unwrap_or(serde_json::Value::Null);
            object.insert(name.clone(), value);
        }
    }

    serde_json::Value::Object(object)
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let scripted = self
            .replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        let content = scripted.unwrap_or_else(|| Self::default_reply(request));
        tracing::debug!("Mock reply: {}", content);

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatMessage, ResponseSchema};

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let client = MockClient::with_replies(["eins", "zwei"]);
        let request = LlmRequest::new("mock", vec![ChatMessage::user("?")]);

        assert_eq!(client.complete(&request).await.unwrap().content, "eins");
        assert_eq!(client.complete(&request).await.unwrap().content, "zwei");
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_echo_when_exhausted() {
        let client = MockClient::new();
        let request = LlmRequest::new(
            "mock",
            vec![ChatMessage::user("erste"), ChatMessage::assistant("a"), ChatMessage::user("zweite")],
        );

        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.content, "zweite");
    }

    #[tokio::test]
    async fn test_schema_default_reply() {
        let client = MockClient::new();
        let request = LlmRequest::new("mock", vec![ChatMessage::user("Hallo")])
            .with_response_schema(ResponseSchema {
                name: "chat_mode".to_string(),
                schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "chat_mode": {"type": "string", "enum": ["chit-chat", "retrieval"]},
                        "note": {"type": ["string", "null"]}
                    }
                }),
            });

        let content = client.complete(&request).await.unwrap().content;
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["chat_mode"], "chit-chat");
        assert!(value["note"].is_null());
    }
}
