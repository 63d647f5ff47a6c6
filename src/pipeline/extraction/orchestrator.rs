use tracing::{debug, info, warn};

use super::confidence::{document_ocr_confidence, low_confidence_words, page_confidence, thresholds};
use super::pdfium::DEFAULT_RENDER_DPI;
use super::types::{
    DocumentMetadata, ExtractionMethod, OcrEngine, PageText, PdfExtractor, PdfPageRenderer,
    RawExtraction,
};
use super::validate::{validate_pdf, DEFAULT_MAX_PDF_BYTES};
use super::ExtractionError;

/// Separator placed between pages in `full_text`.
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorConfig {
    /// Trimmed text shorter than this (in chars) means the document is image-only.
    pub min_text_chars: usize,
    pub max_pdf_bytes: u64,
    pub render_dpi: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 100,
            max_pdf_bytes: DEFAULT_MAX_PDF_BYTES,
            render_dpi: DEFAULT_RENDER_DPI,
        }
    }
}

/// Page renderer and OCR engine used together for image-only documents.
pub struct OcrFallback {
    pub renderer: Box<dyn PdfPageRenderer>,
    pub engine: Box<dyn OcrEngine>,
}

/// PDF bytes in, `RawExtraction` out.
/// Uses trait objects for the PDF backend and OCR, enabling dependency injection.
pub struct DocumentExtractor {
    pdf_extractor: Box<dyn PdfExtractor>,
    ocr: Option<OcrFallback>,
    config: ExtractorConfig,
}

impl DocumentExtractor {
    pub fn new(pdf_extractor: Box<dyn PdfExtractor>, config: ExtractorConfig) -> Self {
        Self {
            pdf_extractor,
            ocr: None,
            config,
        }
    }

    /// Enable OCR for documents without a usable text layer.
    pub fn with_ocr(
        mut self,
        renderer: Box<dyn PdfPageRenderer>,
        engine: Box<dyn OcrEngine>,
    ) -> Self {
        self.ocr = Some(OcrFallback { renderer, engine });
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Extract text and metadata. The input bytes are only read.
    pub fn extract(&self, pdf_bytes: &[u8]) -> Result<RawExtraction, ExtractionError> {
        validate_pdf(pdf_bytes, self.config.max_pdf_bytes)?;
        let file_size_bytes = pdf_bytes.len() as u64;

        let metadata = match self.pdf_extractor.metadata(pdf_bytes) {
            Ok(meta) => meta,
            Err(ExtractionError::Encrypted) => return Err(ExtractionError::Encrypted),
            Err(e) => {
                warn!(error = %e, "PDF metadata unreadable, continuing without it");
                DocumentMetadata::default()
            }
        };

        let pages: Vec<PageText> = self
            .pdf_extractor
            .extract_pages(pdf_bytes)?
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText::new(i + 1, normalize_text(&text), None))
            .collect();

        let full_text = join_pages(&pages);
        let text_chars = full_text.trim().chars().count();

        if text_chars >= self.config.min_text_chars {
            info!(
                pages = pages.len(),
                chars = text_chars,
                size_bytes = file_size_bytes,
                "Text layer extraction complete"
            );
            return Ok(RawExtraction {
                full_text,
                pages,
                is_text_based: true,
                method: ExtractionMethod::PdfDirect,
                metadata,
                file_size_bytes,
            });
        }

        info!(
            chars = text_chars,
            min_chars = self.config.min_text_chars,
            "Text layer below minimum, treating document as image-only"
        );

        let ocr = self.ocr.as_ref().ok_or(ExtractionError::OcrUnavailable)?;
        let pages = self.ocr_pages(pdf_bytes, ocr)?;
        let full_text = join_pages(&pages);

        if full_text.trim().is_empty() {
            return Err(ExtractionError::NoText);
        }

        info!(
            pages = pages.len(),
            chars = full_text.chars().count(),
            confidence = ?document_ocr_confidence(&pages),
            "OCR extraction complete"
        );

        Ok(RawExtraction {
            full_text,
            pages,
            is_text_based: false,
            method: ExtractionMethod::Ocr,
            metadata,
            file_size_bytes,
        })
    }

    fn ocr_pages(
        &self,
        pdf_bytes: &[u8],
        ocr: &OcrFallback,
    ) -> Result<Vec<PageText>, ExtractionError> {
        let page_count = ocr.renderer.page_count(pdf_bytes)?;
        let mut pages = Vec::with_capacity(page_count);

        for index in 0..page_count {
            let image = ocr
                .renderer
                .render_page(pdf_bytes, index, self.config.render_dpi)?;
            let result = ocr.engine.ocr_image(&image)?;
            let confidence = page_confidence(&result);

            let flagged = low_confidence_words(&result, thresholds::MODERATE).len();
            if confidence < thresholds::LOW {
                warn!(page = index + 1, confidence, "Low OCR confidence page");
            }
            debug!(
                page = index + 1,
                words = result.words.len(),
                low_confidence_words = flagged,
                confidence,
                "OCR page done"
            );

            pages.push(PageText::new(
                index + 1,
                normalize_text(&result.text),
                Some(confidence),
            ));
        }

        Ok(pages)
    }
}

fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// Unify line endings, drop control characters and trailing spaces.
/// Blank lines survive: they mark paragraph boundaries for the chunker.
fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdf::{test_pdf, PdfTextExtractor};
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;
    use crate::pipeline::extraction::types::{OcrPageResult, OcrWordResult};

    const FAKE_PDF: &[u8] = b"%PDF-1.4\nfake body";

    /// Mock PDF extractor returning fixed page texts
    struct MockPdfExtractor {
        pages: Vec<String>,
        metadata: Result<DocumentMetadata, ()>,
    }

    impl MockPdfExtractor {
        fn with_pages(pages: &[&str]) -> Self {
            Self {
                pages: pages.iter().map(|p| p.to_string()).collect(),
                metadata: Ok(DocumentMetadata {
                    title: Some("Knee Replacement".into()),
                    ..Default::default()
                }),
            }
        }
    }

    impl PdfExtractor for MockPdfExtractor {
        fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Ok(self.pages.clone())
        }

        fn metadata(&self, _pdf_bytes: &[u8]) -> Result<DocumentMetadata, ExtractionError> {
            self.metadata
                .clone()
                .map_err(|_| ExtractionError::PdfParsing("bad info".into()))
        }
    }

    fn long_page(label: &str) -> String {
        format!("{label}: coverage applies when criteria are met. ").repeat(4)
    }

    #[test]
    fn text_layer_document_is_text_based() {
        let p1 = long_page("Page one");
        let p2 = long_page("Page two");
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&[&p1, &p2])),
            ExtractorConfig::default(),
        );

        let raw = extractor.extract(FAKE_PDF).unwrap();
        assert!(raw.is_text_based);
        assert_eq!(raw.method, ExtractionMethod::PdfDirect);
        assert_eq!(raw.pages.len(), 2);
        assert_eq!(raw.pages[0].page_number, 1);
        assert_eq!(raw.pages[1].page_number, 2);
        assert!(raw.pages.iter().all(|p| p.confidence.is_none()));
        assert_eq!(raw.full_text, format!("{}\n\n{}", p1.trim_end(), p2.trim_end()));
        assert_eq!(raw.metadata.title.as_deref(), Some("Knee Replacement"));
        assert_eq!(raw.file_size_bytes, FAKE_PDF.len() as u64);
    }

    #[test]
    fn short_text_triggers_ocr() {
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&["", "  "])),
            ExtractorConfig::default(),
        )
        .with_ocr(
            Box::new(MockPdfPageRenderer::new(2)),
            Box::new(MockOcrEngine::new("Scanned exclusion list", 0.82)),
        );

        let raw = extractor.extract(FAKE_PDF).unwrap();
        assert!(!raw.is_text_based);
        assert_eq!(raw.method, ExtractionMethod::Ocr);
        assert_eq!(raw.pages.len(), 2);
        for page in &raw.pages {
            assert!((page.confidence.unwrap() - 0.82).abs() < 1e-6);
            assert_eq!(page.text, "Scanned exclusion list");
        }
        assert!((raw.ocr_confidence().unwrap() - 0.82).abs() < 1e-6);
    }

    /// Reads back the width of the rendered page image.
    struct PageWidthOcr;

    impl OcrEngine for PageWidthOcr {
        fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
            use image::GenericImageView;
            let page = image::load_from_memory(image_bytes)
                .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
            let text = format!("rendered {} px wide", page.width());
            Ok(OcrPageResult {
                words: text
                    .split_whitespace()
                    .map(|w| OcrWordResult {
                        text: w.to_string(),
                        confidence: 0.9,
                    })
                    .collect(),
                text,
            })
        }
    }

    #[test]
    fn configured_dpi_reaches_renderer() {
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&[""])),
            ExtractorConfig {
                render_dpi: 300,
                ..Default::default()
            },
        )
        .with_ocr(Box::new(MockPdfPageRenderer::new(1)), Box::new(PageWidthOcr));

        let raw = extractor.extract(FAKE_PDF).unwrap();
        assert_eq!(raw.full_text, "rendered 30 px wide");
    }

    #[test]
    fn image_only_without_ocr_is_unavailable() {
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&["tiny"])),
            ExtractorConfig::default(),
        );
        assert!(matches!(
            extractor.extract(FAKE_PDF),
            Err(ExtractionError::OcrUnavailable)
        ));
    }

    #[test]
    fn ocr_with_no_text_fails() {
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&[""])),
            ExtractorConfig::default(),
        )
        .with_ocr(
            Box::new(MockPdfPageRenderer::new(1)),
            Box::new(MockOcrEngine::new("   ", 0.0)),
        );
        assert!(matches!(
            extractor.extract(FAKE_PDF),
            Err(ExtractionError::NoText)
        ));
    }

    #[test]
    fn threshold_is_configurable() {
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&["Exclusions apply."])),
            ExtractorConfig {
                min_text_chars: 10,
                ..Default::default()
            },
        );
        assert!(extractor.extract(FAKE_PDF).unwrap().is_text_based);
    }

    #[test]
    fn unreadable_metadata_is_not_fatal() {
        let mut mock = MockPdfExtractor::with_pages(&[&long_page("Body")]);
        mock.metadata = Err(());
        let extractor = DocumentExtractor::new(Box::new(mock), ExtractorConfig::default());
        let raw = extractor.extract(FAKE_PDF).unwrap();
        assert_eq!(raw.metadata, DocumentMetadata::default());
    }

    #[test]
    fn intake_errors_surface_before_parsing() {
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&["unused"])),
            ExtractorConfig::default(),
        );
        assert!(matches!(extractor.extract(b""), Err(ExtractionError::Empty)));
        assert!(matches!(
            extractor.extract(b"<html></html>"),
            Err(ExtractionError::NotPdf)
        ));
    }

    #[test]
    fn source_bytes_unchanged() {
        let bytes = FAKE_PDF.to_vec();
        let extractor = DocumentExtractor::new(
            Box::new(MockPdfExtractor::with_pages(&[&long_page("Body")])),
            ExtractorConfig::default(),
        );
        let _ = extractor.extract(&bytes).unwrap();
        assert_eq!(bytes, FAKE_PDF);
    }

    #[test]
    fn real_pdf_through_text_layer() {
        let page = "COVERAGE CRITERIA\n\
                    Total knee replacement is covered when conservative therapy has failed\n\
                    for at least three months and imaging confirms advanced joint damage.";
        let bytes = test_pdf::build(&[page], &[("Title", "Knee Policy")]);
        let extractor = DocumentExtractor::new(Box::new(PdfTextExtractor), ExtractorConfig::default());

        let raw = extractor.extract(&bytes).unwrap();
        assert!(raw.is_text_based);
        assert!(raw.full_text.contains("knee replacement"));
        assert_eq!(raw.metadata.title.as_deref(), Some("Knee Policy"));
    }

    #[test]
    fn normalize_keeps_paragraph_breaks() {
        let text = normalize_text("Line one  \r\n\r\nLine\x07 two\n");
        assert_eq!(text, "Line one\n\nLine two");
    }
}
