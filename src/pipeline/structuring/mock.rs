use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::types::{StructuredExtractionProvider, StructuredRequest};
use super::StructuringError;

/// Deterministic provider replaying a fixed script of responses.
///
/// Each call pops the next entry. Once the script is exhausted the fallback
/// value answers, or `MalformedResponse` when there is none. Every request is
/// recorded for inspection.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Value, StructuringError>>>,
    fallback: Option<Value>,
    requests: Mutex<Vec<StructuredRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Value, StructuringError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Always answers with the same value.
    pub fn always(value: Value) -> Self {
        Self {
            fallback: Some(value),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep before answering, to exercise call-site timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Copies of every request received, in call order.
    pub fn requests(&self) -> Vec<StructuredRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StructuredExtractionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, request: &StructuredRequest) -> Result<Value, StructuringError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .or_else(|| self.fallback.clone().map(Ok))
            .unwrap_or_else(|| Err(StructuringError::MalformedResponse("script exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::types::{ExtractionTarget, GenerationOptions};
    use serde_json::json;

    fn request() -> StructuredRequest {
        StructuredRequest {
            target: ExtractionTarget::Section,
            system_prompt: "sys".into(),
            user_prompt: "user".into(),
            schema: json!({}),
            options: GenerationOptions::default(),
        }
    }

    #[tokio::test]
    async fn replays_in_order_then_exhausts() {
        let p = ScriptedProvider::new(vec![
            Err(StructuringError::Connection("x".into())),
            Ok(json!({"n": 1})),
        ]);
        assert!(p.extract(&request()).await.is_err());
        assert_eq!(p.extract(&request()).await.unwrap(), json!({"n": 1}));
        assert!(matches!(
            p.extract(&request()).await,
            Err(StructuringError::MalformedResponse(_))
        ));
        assert_eq!(p.call_count(), 3);
        assert_eq!(p.requests()[0].user_prompt, "user");
    }

    #[tokio::test]
    async fn always_repeats() {
        let p = ScriptedProvider::always(json!({"ok": true}));
        for _ in 0..5 {
            assert_eq!(p.extract(&request()).await.unwrap(), json!({"ok": true}));
        }
    }
}
