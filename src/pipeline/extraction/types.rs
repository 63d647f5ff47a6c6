use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Text and metadata pulled out of one PDF. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExtraction {
    pub full_text: String,
    pub pages: Vec<PageText>,
    /// True when the embedded text layer was sufficient and OCR was not needed.
    pub is_text_based: bool,
    pub method: ExtractionMethod,
    pub metadata: DocumentMetadata,
    pub file_size_bytes: u64,
}

impl RawExtraction {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Mean OCR confidence across pages, `None` for text-layer extractions.
    pub fn ocr_confidence(&self) -> Option<f32> {
        let scores: Vec<f32> = self.pages.iter().filter_map(|p| p.confidence).collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f32>() / scores.len() as f32)
    }
}

/// How text was extracted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionMethod {
    PdfDirect,
    Ocr,
}

/// Per-page text. `page_number` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
    pub char_count: usize,
    /// OCR recognition confidence in [0, 1]; absent for text-layer pages.
    pub confidence: Option<f32>,
}

impl PageText {
    pub fn new(page_number: usize, text: String, confidence: Option<f32>) -> Self {
        Self {
            page_number,
            char_count: text.chars().count(),
            text,
            confidence,
        }
    }
}

/// Values from the PDF Info dictionary. Every field is optional in the wild.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub words: Vec<OcrWordResult>,
}

/// A single recognised token
#[derive(Debug, Clone)]
pub struct OcrWordResult {
    pub text: String,
    /// 0.0 to 1.0
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

/// PDF text layer extraction abstraction
pub trait PdfExtractor: Send + Sync {
    /// Text per page, in page order.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;

    fn metadata(&self, pdf_bytes: &[u8]) -> Result<DocumentMetadata, ExtractionError>;
}

/// Renders PDF pages to PNG images for OCR.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Rasterise page `page_index` (0-based) to PNG bytes at `dpi`.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}
