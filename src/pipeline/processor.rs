//! Document processing orchestrator.
//!
//! Drives one policy PDF through the pipeline:
//! download → extract (OCR fallback) → chunk + classify → structure → validate → route.
//!
//! Every engine sits behind a trait so the whole run is testable with mocks.
//! The processor issues no persistence calls; callers store the returned
//! `ProcessingOutcome`.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ConfigError, LlmProviderKind, PipelineSettings, StructuringStrategy};
use crate::models::{PolicyExtraction, ProcessingStatus, ValidationError};
use crate::pipeline::chunking::{ClassifiedChunk, DocumentChunker};
use crate::pipeline::extraction::{
    DocumentExtractor, ExtractionError, ExtractionMethod, ExtractorConfig, PdfTextExtractor,
    RawExtraction,
};
use crate::pipeline::review::{
    ConfidenceScorer, QualityMetrics, ReviewDecision, ReviewRouter, RoutingError,
    StatusTracker, StatusTransition,
};
use crate::pipeline::storage::{LocalStorage, StorageAdapter, StorageError};
use crate::pipeline::structuring::{
    GenerationOptions, OllamaProvider, OpenAiProvider, StructuredExtractionProvider,
    StructuringAgent, StructuringError, DEFAULT_OLLAMA_URL, MIN_INPUT_CHARS,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can stop a document run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Structuring failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error("Extraction invalid: {0}")]
    Validation(#[from] ValidationError),

    #[error("Routing failed: {0}")]
    Routing(#[from] RoutingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Job and result types
// ---------------------------------------------------------------------------

/// One unit of work handed over by the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyJob {
    pub document_id: Uuid,
    pub storage_path: String,
    pub payer_name: String,
    /// Policies already processed for this payer. Read-only input to the gate.
    pub payer_policy_count: u32,
}

/// Extraction stage summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionSummary {
    pub method: ExtractionMethod,
    pub is_text_based: bool,
    pub page_count: usize,
    pub text_chars: usize,
    pub ocr_confidence: Option<f32>,
    pub chunk_count: usize,
    pub file_size_bytes: u64,
}

/// Everything the caller persists for a run.
///
/// `processing_status` is always terminal or PENDING_REVIEW; a failed run
/// carries `error_message` and no extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub document_id: Uuid,
    pub processing_status: ProcessingStatus,
    pub requires_manual_review: bool,
    pub extraction_confidence_score: Option<f32>,
    pub error_message: Option<String>,
    pub extraction_summary: Option<ExtractionSummary>,
    pub extraction: Option<PolicyExtraction>,
    pub review: Option<ReviewDecision>,
    pub quality: Option<QualityMetrics>,
    pub status_history: Vec<StatusTransition>,
}

struct RunOutput {
    summary: ExtractionSummary,
    extraction: PolicyExtraction,
    decision: ReviewDecision,
    quality: QualityMetrics,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    storage: Arc<dyn StorageAdapter>,
    extractor: Arc<DocumentExtractor>,
    chunker: DocumentChunker,
    agent: StructuringAgent,
    router: ReviewRouter,
    strategy: StructuringStrategy,
}

impl DocumentProcessor {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        extractor: DocumentExtractor,
        agent: StructuringAgent,
    ) -> Self {
        Self {
            storage,
            extractor: Arc::new(extractor),
            chunker: DocumentChunker::default(),
            agent,
            router: ReviewRouter::default(),
            strategy: StructuringStrategy::WholeDocument,
        }
    }

    pub fn with_chunker(mut self, chunker: DocumentChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_router(mut self, router: ReviewRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_strategy(mut self, strategy: StructuringStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Run the full pipeline for one job.
    ///
    /// Never returns an error: any failure ends the run in FAILED with the
    /// error text in `error_message`.
    pub async fn process(&self, job: &PolicyJob) -> ProcessingOutcome {
        let span = tracing::info_span!(
            "process_document",
            document_id = %job.document_id,
            payer = %job.payer_name,
        );

        async {
            let mut tracker = StatusTracker::new(job.document_id);

            match self.run(job, &mut tracker).await {
                Ok(run) => {
                    tracing::info!(
                        status = %tracker.status(),
                        confidence = run.decision.overall_confidence,
                        sections = run.quality.section_count,
                        "Processing complete"
                    );
                    ProcessingOutcome {
                        document_id: job.document_id,
                        processing_status: tracker.status(),
                        requires_manual_review: run.decision.requires_review,
                        extraction_confidence_score: Some(run.decision.overall_confidence),
                        error_message: None,
                        extraction_summary: Some(run.summary),
                        extraction: Some(run.extraction),
                        review: Some(run.decision),
                        quality: Some(run.quality),
                        status_history: tracker.history().to_vec(),
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(status = %tracker.status(), error = %message, "Processing failed");
                    if let Err(route_err) = tracker.fail(message.clone()) {
                        tracing::warn!(error = %route_err, "Could not record failure transition");
                    }
                    ProcessingOutcome {
                        document_id: job.document_id,
                        processing_status: ProcessingStatus::Failed,
                        requires_manual_review: false,
                        extraction_confidence_score: None,
                        error_message: Some(message),
                        extraction_summary: None,
                        extraction: None,
                        review: None,
                        quality: None,
                        status_history: tracker.history().to_vec(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        job: &PolicyJob,
        tracker: &mut StatusTracker,
    ) -> Result<RunOutput, ProcessingError> {
        tracker.advance(ProcessingStatus::ExtractingText)?;

        let bytes = self.storage.download(&job.storage_path).await?;
        let raw = self.extract_blocking(bytes).await?;

        tracker.advance(ProcessingStatus::StructuringData)?;

        let chunks = self.chunker.chunk_and_classify(&raw.full_text);
        let summary = ExtractionSummary {
            method: raw.method,
            is_text_based: raw.is_text_based,
            page_count: raw.page_count(),
            text_chars: raw.full_text.chars().count(),
            ocr_confidence: raw.ocr_confidence(),
            chunk_count: chunks.len(),
            file_size_bytes: raw.file_size_bytes,
        };

        tracing::info!(
            method = ?summary.method,
            pages = summary.page_count,
            chunks = summary.chunk_count,
            strategy = ?self.strategy,
            "Processing: starting structuring"
        );

        let extraction = self.structure(&raw, &chunks, &job.payer_name).await?;
        extraction.validate()?;

        let decision = self
            .router
            .route(tracker, &extraction, job.payer_policy_count)?;
        let quality = self.router.scorer().get_quality_metrics(&extraction);

        Ok(RunOutput {
            summary,
            extraction,
            decision,
            quality,
        })
    }

    /// PDF parsing and OCR are CPU-bound; keep them off the async workers.
    async fn extract_blocking(&self, bytes: Vec<u8>) -> Result<RawExtraction, ExtractionError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
    }

    async fn structure(
        &self,
        raw: &RawExtraction,
        chunks: &[ClassifiedChunk],
        payer_name: &str,
    ) -> Result<PolicyExtraction, StructuringError> {
        let mut extraction = self
            .agent
            .extract_with_retry(&raw.full_text, payer_name, chunks)
            .await?;

        if self.strategy == StructuringStrategy::PerSection {
            let mut sections = Vec::with_capacity(chunks.len());
            for entry in chunks {
                let chunk = &entry.chunk;
                if chunk.text.trim().chars().count() < MIN_INPUT_CHARS {
                    tracing::debug!(title = %chunk.title, "Skipping near-empty chunk");
                    continue;
                }
                let section = self
                    .agent
                    .extract_section_with_retry(&chunk.title, &chunk.text)
                    .await?;
                sections.push(section);
            }
            extraction.sections = sections;
        }

        Ok(extraction)
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a `DocumentProcessor` with production implementations.
///
/// - Storage: `LocalStorage` at `local_storage_path`
/// - PDF: `PdfTextExtractor`, plus PDFium + Tesseract when the `ocr` feature is on
/// - LLM: `OllamaProvider` or `OpenAiProvider` per `llm_provider`
pub fn build_processor(settings: &PipelineSettings) -> Result<DocumentProcessor, ProcessingError> {
    settings.validate()?;

    let storage = Arc::new(LocalStorage::new(&settings.local_storage_path)?);

    let extractor = DocumentExtractor::new(
        Box::new(PdfTextExtractor),
        ExtractorConfig {
            min_text_chars: settings.min_text_chars,
            max_pdf_bytes: settings.max_upload_bytes(),
            render_dpi: settings.ocr_render_dpi,
        },
    );
    let extractor = attach_ocr(extractor, settings);

    let provider = build_provider(settings)?;
    tracing::info!(
        provider = provider.name(),
        model = %settings.llm_model,
        "Document processor using LLM provider"
    );
    let agent = StructuringAgent::new(
        provider,
        settings.retry_policy(),
        GenerationOptions {
            temperature: settings.llm_temperature,
            max_tokens: settings.llm_max_tokens,
        },
    );

    Ok(DocumentProcessor::new(storage, extractor, agent)
        .with_chunker(DocumentChunker::new(settings.chunker_config()))
        .with_router(ReviewRouter::new(ConfidenceScorer::new(settings.scorer_config())))
        .with_strategy(settings.structuring_strategy))
}

fn build_provider(
    settings: &PipelineSettings,
) -> Result<Arc<dyn StructuredExtractionProvider>, ProcessingError> {
    let timeout = settings.retry_policy().call_timeout;
    let provider: Arc<dyn StructuredExtractionProvider> = match settings.llm_provider {
        LlmProviderKind::Ollama => Arc::new(OllamaProvider::new(
            settings.llm_base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            &settings.llm_model,
            timeout,
        )?),
        LlmProviderKind::OpenAi => {
            let key = settings
                .openai_api_key
                .as_deref()
                .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
            Arc::new(OpenAiProvider::new(
                settings.llm_base_url.as_deref(),
                key,
                &settings.llm_model,
                timeout,
            )?)
        }
    };
    Ok(provider)
}

/// Attach PDFium rendering and Tesseract OCR when both are available.
/// Without them, image-only documents fail with `OcrUnavailable`.
#[cfg(feature = "ocr")]
fn attach_ocr(extractor: DocumentExtractor, settings: &PipelineSettings) -> DocumentExtractor {
    use crate::pipeline::extraction::pdfium::PdfiumRenderer;
    use crate::pipeline::extraction::TesseractEngine;

    let renderer = match PdfiumRenderer::new(None) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "PDFium unavailable, image-only PDFs will fail");
            return extractor;
        }
    };

    let tessdata = find_tessdata_dir(&settings.ocr_languages);
    match TesseractEngine::new(tessdata.as_deref(), &settings.ocr_languages) {
        Ok(engine) => {
            tracing::info!(
                languages = %settings.ocr_languages,
                tessdata = ?tessdata,
                "Tesseract OCR initialized"
            );
            extractor.with_ocr(Box::new(renderer), Box::new(engine))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Tesseract unavailable, image-only PDFs will fail");
            extractor
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn attach_ocr(extractor: DocumentExtractor, _settings: &PipelineSettings) -> DocumentExtractor {
    tracing::info!("Built without the `ocr` feature, image-only PDFs will fail");
    extractor
}

/// Locate a tessdata directory holding the first requested language.
/// `None` lets Tesseract use its compiled-in search path.
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn find_tessdata_dir(languages: &str) -> Option<PathBuf> {
    let first = languages.split('+').next().unwrap_or("eng");
    let traineddata = format!("{first}.traineddata");

    let from_env = std::env::var("TESSDATA_PREFIX").ok().map(PathBuf::from);
    let candidates = [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
    ];

    from_env
        .into_iter()
        .chain(candidates.iter().map(PathBuf::from))
        .find(|dir| dir.join(&traineddata).exists())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
