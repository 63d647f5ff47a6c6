use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parser::parse_json_payload;
use super::types::{StructuredExtractionProvider, StructuredRequest};
use super::StructuringError;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// OpenAI-compatible `/v1/chat/completions` with a `json_schema` response format.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(
        base_url: Option<&str>,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, StructuringError> {
        if api_key.trim().is_empty() {
            return Err(StructuringError::Configuration("OpenAI API key is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StructuringError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_OPENAI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a Value,
    strict: bool,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn completion_request<'a>(model: &'a str, request: &'a StructuredRequest) -> CompletionRequest<'a> {
    CompletionRequest {
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
        temperature: request.options.temperature,
        max_tokens: request.options.max_tokens,
        response_format: ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: request.target.schema_name(),
                schema: &request.schema,
                // Optional fields in the schema rule out strict mode.
                strict: false,
            },
        },
    }
}

fn first_choice_content(response: CompletionResponse) -> Result<String, StructuringError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| StructuringError::MalformedResponse("missing choices[0].message.content".into()))
}

#[async_trait]
impl StructuredExtractionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(&self, request: &StructuredRequest) -> Result<Value, StructuringError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = completion_request(&self.model, request);

        tracing::debug!(url = %url, model = %self.model, "OpenAI structuring request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| StructuringError::MalformedResponse(e.to_string()))?;

        parse_json_payload(&first_choice_content(parsed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::types::{ExtractionTarget, GenerationOptions};
    use serde_json::json;

    #[test]
    fn empty_key_rejected() {
        let err = OpenAiProvider::new(None, "  ", "gpt-4o", Duration::from_secs(5)).err();
        assert!(matches!(err, Some(StructuringError::Configuration(_))));
    }

    #[test]
    fn default_base_url() {
        let p = OpenAiProvider::new(None, "sk-test", "gpt-4o", Duration::from_secs(5)).unwrap();
        assert_eq!(p.base_url, DEFAULT_OPENAI_URL);
        assert_eq!(p.name(), "openai");
    }

    #[test]
    fn request_carries_json_schema_format() {
        let request = StructuredRequest {
            target: ExtractionTarget::Policy,
            system_prompt: "sys".into(),
            user_prompt: "Payer: Cigna".into(),
            schema: json!({"type": "object"}),
            options: GenerationOptions::default(),
        };
        let v = serde_json::to_value(completion_request("gpt-4o", &request)).unwrap();
        assert_eq!(v["response_format"]["type"], json!("json_schema"));
        assert_eq!(
            v["response_format"]["json_schema"]["name"],
            json!("policy_extraction")
        );
        assert_eq!(v["response_format"]["json_schema"]["strict"], json!(false));
        assert_eq!(v["messages"][1]["content"], json!("Payer: Cigna"));
        assert_eq!(v["max_tokens"], json!(4000));
    }

    #[test]
    fn choice_content_extracted() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"ok\": true}"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_choice_content(parsed).unwrap(), "{\"ok\": true}");
    }

    #[test]
    fn refusal_without_content_is_malformed() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            first_choice_content(parsed),
            Err(StructuringError::MalformedResponse(_))
        ));
        let empty: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_choice_content(empty).is_err());
    }
}
