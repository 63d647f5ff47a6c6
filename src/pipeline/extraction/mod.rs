pub mod confidence;
pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod pdfium;
pub mod types;
pub mod validate;

pub use confidence::*;
pub use ocr::*;
pub use orchestrator::*;
pub use pdf::*;
pub use types::*;
pub use validate::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document is empty")]
    Empty,

    #[error("Not a PDF document (missing %PDF- header)")]
    NotPdf,

    #[error("PDF is encrypted or password-protected")]
    Encrypted,

    #[error("Document is {size} bytes, above the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Document has no text layer and no OCR backend is configured")]
    OcrUnavailable,

    #[error("No text could be extracted from the document")]
    NoText,

    #[error("Extraction task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
