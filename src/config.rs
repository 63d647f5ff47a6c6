//! Pipeline settings.
//!
//! One explicit `PipelineSettings` value, loaded from the environment once by
//! the host and handed to component constructors. Nothing in the pipeline
//! reads the environment on its own.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::chunking::ChunkerConfig;
use crate::pipeline::review::ScorerConfig;
use crate::pipeline::structuring::RetryPolicy;

/// Application-level constants
pub const APP_NAME: &str = "PolicyPrism";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound for `RETRY_BACKOFF_BASE`, in seconds.
pub const MAX_RETRY_BACKOFF_BASE_SECS: f64 = 3600.0;

/// Upper bound for `MAX_UPLOAD_MB` (10 GiB).
pub const MAX_UPLOAD_MB_LIMIT: u64 = 10 * 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} is required for the selected LLM provider")]
    Missing(&'static str),
}

/// Which structured-output backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    Ollama,
    OpenAi,
}

impl FromStr for LlmProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            other => Err(format!("unsupported provider '{other}'")),
        }
    }
}

/// Granularity of structuring calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuringStrategy {
    /// One call over the full document text.
    WholeDocument,
    /// One call for policy identity, then one call per chunk.
    PerSection,
}

impl FromStr for StructuringStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whole_document" | "document" => Ok(Self::WholeDocument),
            "per_section" | "section" => Ok(Self::PerSection),
            other => Err(format!("unsupported strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            other => Err(format!("unsupported log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub llm_provider: LlmProviderKind,
    pub llm_model: String,
    /// Provider default when unset.
    pub llm_base_url: Option<String>,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_secs: f64,
    pub confidence_threshold: f32,
    pub first_n_policies: u32,
    pub structuring_strategy: StructuringStrategy,
    pub max_chunk_size: usize,
    pub boundary_merge_window: usize,
    pub min_text_chars: usize,
    pub max_upload_mb: u64,
    pub ocr_render_dpi: u32,
    pub ocr_languages: String,
    pub local_storage_path: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            llm_provider: LlmProviderKind::Ollama,
            llm_model: "llama3.1:8b".into(),
            llm_base_url: None,
            openai_api_key: None,
            llm_temperature: 0.1,
            llm_max_tokens: 4000,
            llm_timeout_secs: 300,
            max_retries: 2,
            retry_backoff_base_secs: 2.0,
            confidence_threshold: 0.85,
            first_n_policies: 5,
            structuring_strategy: StructuringStrategy::WholeDocument,
            max_chunk_size: 4000,
            boundary_merge_window: 0,
            min_text_chars: 100,
            max_upload_mb: 100,
            ocr_render_dpi: 200,
            ocr_languages: "eng".into(),
            local_storage_path: PathBuf::from("./storage/pdfs"),
            log_level: "info".into(),
            log_format: LogFormat::Json,
        }
    }
}

impl PipelineSettings {
    /// Load from process environment variables, defaulting anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (environment, `.env` map, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Self::default();

        if let Some(v) = lookup("LLM_PROVIDER") {
            s.llm_provider = parse_value("LLM_PROVIDER", &v)?;
        }
        if let Some(v) = non_empty(lookup("LLM_MODEL")) {
            s.llm_model = v;
        }
        s.llm_base_url = non_empty(lookup("LLM_BASE_URL"));
        s.openai_api_key = non_empty(lookup("OPENAI_API_KEY"));
        if let Some(v) = lookup("LLM_TEMPERATURE") {
            s.llm_temperature = parse_value("LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("LLM_MAX_TOKENS") {
            s.llm_max_tokens = parse_value("LLM_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("LLM_TIMEOUT_SECS") {
            s.llm_timeout_secs = parse_value("LLM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("MAX_RETRIES") {
            s.max_retries = parse_value("MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("RETRY_BACKOFF_BASE") {
            s.retry_backoff_base_secs = parse_value("RETRY_BACKOFF_BASE", &v)?;
        }
        if let Some(v) = lookup("EXTRACTION_CONFIDENCE_THRESHOLD") {
            s.confidence_threshold = parse_value("EXTRACTION_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("HUMAN_REVIEW_FIRST_N_POLICIES") {
            s.first_n_policies = parse_value("HUMAN_REVIEW_FIRST_N_POLICIES", &v)?;
        }
        if let Some(v) = lookup("STRUCTURING_STRATEGY") {
            s.structuring_strategy = parse_value("STRUCTURING_STRATEGY", &v)?;
        }
        if let Some(v) = lookup("MAX_CHUNK_SIZE") {
            s.max_chunk_size = parse_value("MAX_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("BOUNDARY_MERGE_WINDOW") {
            s.boundary_merge_window = parse_value("BOUNDARY_MERGE_WINDOW", &v)?;
        }
        if let Some(v) = lookup("MIN_TEXT_CHARS") {
            s.min_text_chars = parse_value("MIN_TEXT_CHARS", &v)?;
        }
        if let Some(v) = lookup("MAX_UPLOAD_MB") {
            s.max_upload_mb = parse_value("MAX_UPLOAD_MB", &v)?;
        }
        if let Some(v) = lookup("OCR_RENDER_DPI") {
            s.ocr_render_dpi = parse_value("OCR_RENDER_DPI", &v)?;
        }
        if let Some(v) = non_empty(lookup("OCR_LANGUAGES")) {
            s.ocr_languages = v;
        }
        if let Some(v) = non_empty(lookup("LOCAL_STORAGE_PATH")) {
            s.local_storage_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty(lookup("LOG_LEVEL")) {
            s.log_level = v.to_lowercase();
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            s.log_format = parse_value("LOG_FORMAT", &v)?;
        }

        s.validate()?;
        Ok(s)
    }

    /// Range checks that would otherwise surface as odd pipeline behavior.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid(
                "EXTRACTION_CONFIDENCE_THRESHOLD",
                self.confidence_threshold,
                "must be within [0, 1]",
            ));
        }
        if self.max_chunk_size == 0 {
            return Err(invalid("MAX_CHUNK_SIZE", 0, "must be positive"));
        }
        if !(0.0..=MAX_RETRY_BACKOFF_BASE_SECS).contains(&self.retry_backoff_base_secs) {
            return Err(invalid(
                "RETRY_BACKOFF_BASE",
                self.retry_backoff_base_secs,
                &format!("must be between 0 and {MAX_RETRY_BACKOFF_BASE_SECS} seconds"),
            ));
        }
        if self.max_upload_mb == 0 || self.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            return Err(invalid(
                "MAX_UPLOAD_MB",
                self.max_upload_mb,
                &format!("must be between 1 and {MAX_UPLOAD_MB_LIMIT}"),
            ));
        }
        if self.llm_timeout_secs == 0 {
            return Err(invalid("LLM_TIMEOUT_SECS", 0, "must be positive"));
        }
        if self.llm_provider == LlmProviderKind::OpenAi && self.openai_api_key.is_none() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }
        Ok(())
    }

    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_chunk_size: self.max_chunk_size,
            boundary_merge_window: self.boundary_merge_window,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            // NaN fails the conversion and falls back to no backoff.
            backoff_base: Duration::try_from_secs_f64(
                self.retry_backoff_base_secs
                    .clamp(0.0, MAX_RETRY_BACKOFF_BASE_SECS),
            )
            .unwrap_or_default(),
            call_timeout: Duration::from_secs(self.llm_timeout_secs),
        }
    }

    pub fn scorer_config(&self) -> ScorerConfig {
        ScorerConfig {
            threshold: self.confidence_threshold,
            first_n_threshold: self.first_n_policies,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> String {
        format!("warn,policyprism={}", self.log_level)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(key: &'static str, value: impl std::fmt::Display, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
