use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parser::parse_json_payload;
use super::types::{StructuredExtractionProvider, StructuredRequest};
use super::StructuringError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Local Ollama instance using `/api/chat` with a JSON-schema `format`.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, StructuringError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StructuringError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a Value,
    options: ChatOptions,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

fn chat_request<'a>(model: &'a str, request: &'a StructuredRequest) -> OllamaChatRequest<'a> {
    OllamaChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: &request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.user_prompt,
            },
        ],
        stream: false,
        format: &request.schema,
        options: ChatOptions {
            temperature: request.options.temperature,
            num_predict: request.options.max_tokens,
        },
    }
}

#[async_trait]
impl StructuredExtractionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn extract(&self, request: &StructuredRequest) -> Result<Value, StructuringError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = chat_request(&self.model, request);

        tracing::debug!(url = %url, model = %self.model, "Ollama structuring request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StructuringError::from_reqwest(e, &self.base_url, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StructuringError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| StructuringError::MalformedResponse(e.to_string()))?;

        parse_json_payload(&parsed.message.content)
    }
}
