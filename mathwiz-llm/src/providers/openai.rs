//! OpenAI-compatible chat-completions generation provider

use crate::providers::{invalid_response, request_failed};
use crate::GenerationProvider;
use async_trait::async_trait;
use mathwiz_core::{GenerationOptions, MathWizResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorDetail {
    message: String,
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Generation provider speaking the OpenAI chat-completions wire format.
/// Works against api.openai.com or any compatible endpoint (Ollama, vLLM, ...).
pub struct OpenAiGenerationProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerationProvider {
    /// Create a new provider.
    ///
    /// # Arguments
    /// * `base_url` - API base, e.g. "https://api.openai.com/v1"
    /// * `api_key` - Bearer token for the endpoint
    /// * `model` - Model name, e.g. "gpt-4"
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Create a provider against the public OpenAI endpoint.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("https://api.openai.com/v1", api_key, model)
    }
}

#[async_trait]
impl GenerationProvider for OpenAiGenerationProvider {
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> MathWizResult<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: Some(opts.max_tokens),
            temperature: Some(opts.temperature),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed("openai", 0, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let error_msg = match serde_json::from_str::<ApiError>(&error_text) {
                Ok(api_error) => api_error.error.message,
                Err(_) => error_text,
            };
            return Err(request_failed("openai", status.as_u16() as i32, error_msg));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| invalid_response("openai", format!("Failed to parse response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| invalid_response("openai", "No completion in response"))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiGenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerationProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_serialization() {
        let request = CompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "solve x".to_string(),
            }],
            max_tokens: Some(100),
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["max_tokens"], 100);
        // Absent options must not appear in the payload
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_completion_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"x = 2"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "x = 2");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = OpenAiGenerationProvider::openai("sk-secret", "gpt-4");
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
