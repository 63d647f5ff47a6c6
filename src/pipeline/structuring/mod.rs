pub mod mock;
pub mod ollama;
pub mod openai;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod schema;
pub mod types;

pub use mock::*;
pub use ollama::*;
pub use openai::*;
pub use orchestrator::*;
pub use parser::*;
pub use prompt::*;
pub use types::*;

use std::time::Duration;

use thiserror::Error;

/// Structuring failures. Only `String` payloads so scripted test providers
/// can hand out clones.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuringError {
    #[error("LLM endpoint unreachable at {0}")]
    Connection(String),

    #[error("Structuring call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM provider returned error (status {status}): {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("Response violates extraction schema: {0}")]
    SchemaViolation(String),

    #[error("Input text too short for structuring (< {} characters)", MIN_INPUT_CHARS)]
    InputTooShort,

    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

impl StructuringError {
    /// Whether a fresh call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InputTooShort | Self::Configuration(_))
    }

    /// Map a reqwest send/receive failure, keeping connect and timeout distinct.
    pub(crate) fn from_reqwest(e: reqwest::Error, endpoint: &str, timeout: Duration) -> Self {
        if e.is_connect() {
            Self::Connection(endpoint.to_string())
        } else if e.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::HttpClient(e.to_string())
        }
    }
}
