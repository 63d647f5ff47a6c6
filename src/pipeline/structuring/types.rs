use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::StructuringError;

/// Which output shape a call asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTarget {
    Policy,
    Section,
}

impl ExtractionTarget {
    pub fn schema_name(self) -> &'static str {
        match self {
            Self::Policy => "policy_extraction",
            Self::Section => "policy_section_extraction",
        }
    }
}

/// Sampling knobs forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 4000,
        }
    }
}

/// One self-contained structuring call. Every attempt builds a fresh one;
/// no conversation history is carried between attempts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredRequest {
    pub target: ExtractionTarget,
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON Schema the response must satisfy.
    pub schema: Value,
    pub options: GenerationOptions,
}

/// A backend that turns a prompt plus schema into a JSON value.
///
/// Implementations only transport and decode; schema checking of the value
/// happens in the parser so every backend is held to the same contract.
#[async_trait]
pub trait StructuredExtractionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, request: &StructuredRequest) -> Result<Value, StructuringError>;
}
