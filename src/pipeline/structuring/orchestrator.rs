use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::Instrument;

use super::parser::{parse_policy, parse_section};
use super::prompt::{
    build_policy_prompt, build_section_prompt, POLICY_SYSTEM_PROMPT, SECTION_SYSTEM_PROMPT,
};
use super::schema::{policy_schema, section_schema};
use super::types::{
    ExtractionTarget, GenerationOptions, StructuredExtractionProvider, StructuredRequest,
};
use super::StructuringError;
use crate::models::{PolicyExtraction, SectionExtraction};
use crate::pipeline::chunking::ClassifiedChunk;

/// Minimum trimmed input length for structuring (characters).
pub const MIN_INPUT_CHARS: usize = 10;

/// How many times to call the provider and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first; total calls are `1 + max_retries`.
    pub max_retries: u32,
    pub backoff_base: Duration,
    /// Upper bound on each individual provider call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_secs(2),
            call_timeout: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (zero-based): `backoff_base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Drives a structured-output provider to produce policy extractions.
///
/// Every call is a fresh, self-contained request. Output that fails the schema
/// check is an error like any transport failure; no default structure is ever
/// substituted.
pub struct StructuringAgent {
    provider: Arc<dyn StructuredExtractionProvider>,
    retry: RetryPolicy,
    options: GenerationOptions,
}

impl StructuringAgent {
    pub fn new(
        provider: Arc<dyn StructuredExtractionProvider>,
        retry: RetryPolicy,
        options: GenerationOptions,
    ) -> Self {
        Self {
            provider,
            retry,
            options,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One whole-document call: identity fields plus sections.
    pub async fn extract_policy(
        &self,
        text: &str,
        payer_name: &str,
        outline: &[ClassifiedChunk],
    ) -> Result<PolicyExtraction, StructuringError> {
        check_input(text)?;
        let request = StructuredRequest {
            target: ExtractionTarget::Policy,
            system_prompt: POLICY_SYSTEM_PROMPT.to_string(),
            user_prompt: build_policy_prompt(text, payer_name, outline),
            schema: policy_schema(),
            options: self.options,
        };
        let value = self.call(&request).await?;
        parse_policy(value, payer_name)
    }

    /// One single-section call.
    pub async fn extract_section(
        &self,
        title: &str,
        text: &str,
    ) -> Result<SectionExtraction, StructuringError> {
        check_input(text)?;
        let request = StructuredRequest {
            target: ExtractionTarget::Section,
            system_prompt: SECTION_SYSTEM_PROMPT.to_string(),
            user_prompt: build_section_prompt(title, text),
            schema: section_schema(),
            options: self.options,
        };
        let value = self.call(&request).await?;
        parse_section(value)
    }

    /// Whole-document extraction with retry and exponential backoff.
    pub async fn extract_with_retry(
        &self,
        text: &str,
        payer_name: &str,
        outline: &[ClassifiedChunk],
    ) -> Result<PolicyExtraction, StructuringError> {
        self.retrying(ExtractionTarget::Policy, move || {
            self.extract_policy(text, payer_name, outline)
        })
        .await
    }

    /// Single-section extraction with retry and exponential backoff.
    pub async fn extract_section_with_retry(
        &self,
        title: &str,
        text: &str,
    ) -> Result<SectionExtraction, StructuringError> {
        self.retrying(ExtractionTarget::Section, move || self.extract_section(title, text))
            .await
    }

    async fn call(&self, request: &StructuredRequest) -> Result<Value, StructuringError> {
        let timeout = self.retry.call_timeout;
        match tokio::time::timeout(timeout, self.provider.extract(request)).await {
            Ok(result) => result,
            Err(_) => Err(StructuringError::Timeout(timeout)),
        }
    }

    async fn retrying<T, F, Fut>(
        &self,
        target: ExtractionTarget,
        mut attempt_fn: F,
    ) -> Result<T, StructuringError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StructuringError>>,
    {
        let mut attempt = 0u32;
        loop {
            let span = tracing::info_span!(
                "structuring_call",
                provider = self.provider.name(),
                target = ?target,
                attempt = attempt + 1,
            );

            let error = match attempt_fn().instrument(span).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, ?target, "Structuring succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.retry.max_retries {
                tracing::error!(
                    attempt = attempt + 1,
                    ?target,
                    error = %error,
                    "Structuring failed"
                );
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                max_attempts = self.retry.max_retries + 1,
                ?target,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Structuring attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn check_input(text: &str) -> Result<(), StructuringError> {
    if text.trim().chars().count() < MIN_INPUT_CHARS {
        return Err(StructuringError::InputTooShort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, SectionType};
    use crate::pipeline::structuring::ScriptedProvider;
    use serde_json::json;

    const POLICY_TEXT: &str = "Medical Policy: Knee Replacement Surgery\n\nCoverage Criteria\nTotal knee replacement (CPT 27447) is covered when conservative therapy fails.";

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(1),
            call_timeout: Duration::from_secs(5),
        }
    }

    fn policy_json() -> Value {
        json!({
            "policy_name": "Medical Policy: Knee Replacement Surgery",
            "policy_number": "MP-2024-001",
            "payer_name": "Cigna",
            "effective_date": "2024-01-01",
            "document_type": "MEDICAL",
            "sections": [{
                "section_type": "COVERAGE_CRITERIA",
                "title": "Coverage Criteria",
                "content_summary": "TKA criteria",
                "coverage_criteria": [{
                    "procedure_name": "Total Knee Replacement",
                    "procedure_code": "27447",
                    "covered_scenarios": "Failed conservative therapy",
                    "prior_authorization_required": true,
                    "confidence_score": 0.95
                }],
                "exclusions": [],
                "confidence_score": 0.9
            }],
            "overall_confidence_score": 0.9
        })
    }

    fn agent(provider: Arc<ScriptedProvider>, retry: RetryPolicy) -> StructuringAgent {
        StructuringAgent::new(provider, retry, GenerationOptions::default())
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn single_call_parses_policy() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(policy_json())]));
        let a = agent(provider.clone(), fast_retry(2));
        let p = a.extract_policy(POLICY_TEXT, "Cigna", &[]).await.unwrap();
        assert_eq!(p.document_type, DocumentType::Medical);
        assert_eq!(p.sections[0].section_type, SectionType::CoverageCriteria);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, ExtractionTarget::Policy);
        assert!(requests[0].user_prompt.starts_with("Payer: Cigna\n\n"));
        assert_eq!(requests[0].system_prompt, POLICY_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn fails_twice_then_succeeds() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(StructuringError::Connection("http://localhost:11434".into())),
            Err(StructuringError::MalformedResponse("truncated".into())),
            Ok(policy_json()),
        ]));
        let a = agent(provider.clone(), fast_retry(2));
        let p = a.extract_with_retry(POLICY_TEXT, "Cigna", &[]).await.unwrap();
        assert_eq!(p.policy_number.as_deref(), Some("MP-2024-001"));
        assert_eq!(provider.call_count(), 3);

        // Each attempt is an independent request with identical content.
        let requests = provider.requests();
        assert_eq!(requests[0], requests[2]);
    }

    #[tokio::test]
    async fn fails_three_times_returns_last_error_unchanged() {
        let last = StructuringError::ProviderStatus {
            status: 503,
            body: "model loading".into(),
        };
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(StructuringError::Connection("a".into())),
            Err(StructuringError::MalformedResponse("b".into())),
            Err(last.clone()),
            Ok(policy_json()),
        ]));
        let a = agent(provider.clone(), fast_retry(2));
        let err = a.extract_with_retry(POLICY_TEXT, "Cigna", &[]).await.unwrap_err();
        assert_eq!(err, last);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn schema_violation_is_retried() {
        let mut bad = policy_json();
        bad["overall_confidence_score"] = json!(7.5);
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(bad), Ok(policy_json())]));
        let a = agent(provider.clone(), fast_retry(2));
        assert!(a.extract_with_retry(POLICY_TEXT, "Cigna", &[]).await.is_ok());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_one_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(StructuringError::Connection("a".into())),
            Ok(policy_json()),
        ]));
        let a = agent(provider.clone(), fast_retry(0));
        assert!(a.extract_with_retry(POLICY_TEXT, "Cigna", &[]).await.is_err());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn short_input_never_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::always(policy_json()));
        let a = agent(provider.clone(), fast_retry(2));
        let err = a.extract_with_retry("  tiny  ", "Cigna", &[]).await.unwrap_err();
        assert_eq!(err, StructuringError::InputTooShort);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = Arc::new(
            ScriptedProvider::always(policy_json()).with_delay(Duration::from_millis(500)),
        );
        let retry = RetryPolicy {
            max_retries: 1,
            backoff_base: Duration::from_millis(1),
            call_timeout: Duration::from_millis(20),
        };
        let a = agent(provider.clone(), retry);
        let err = a.extract_with_retry(POLICY_TEXT, "Cigna", &[]).await.unwrap_err();
        assert_eq!(err, StructuringError::Timeout(Duration::from_millis(20)));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn section_extraction_uses_section_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(json!({
            "section_type": "EXCLUSIONS",
            "title": "Exclusions",
            "content_summary": "Cosmetic",
            "coverage_criteria": [],
            "exclusions": [{"excluded_procedure": "Cosmetic surgery", "confidence_score": 0.8}],
            "confidence_score": 0.85
        }))]));
        let a = agent(provider.clone(), fast_retry(2));
        let s = a
            .extract_section_with_retry("Exclusions", "Cosmetic procedures are not covered.")
            .await
            .unwrap();
        assert_eq!(s.section_type, SectionType::Exclusions);
        assert_eq!(s.exclusions.len(), 1);

        let request = &provider.requests()[0];
        assert_eq!(request.target, ExtractionTarget::Section);
        assert_eq!(
            request.user_prompt,
            "Section Title: Exclusions\n\nContent:\nCosmetic procedures are not covered."
        );
    }
}
