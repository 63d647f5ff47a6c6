//! Page rasterisation for image-only policy scans.
//!
//! `Pdfium` is `!Send`, so every call binds the library afresh; the OS keeps
//! the shared object loaded between binds.

use std::path::PathBuf;

use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use pdfium_render::prelude::*;
use tracing::debug;

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Render resolution used when `ExtractorConfig::render_dpi` is not overridden.
pub const DEFAULT_RENDER_DPI: u32 = 200;

/// Longest rendered edge in pixels. Oversized pages scale down uniformly.
const MAX_EDGE_PX: i32 = 4096;

pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Fails when no PDFium library can be bound. Looks at `library_path`,
    /// then `PDFIUM_DYNAMIC_LIB_PATH`, then the system search path.
    pub fn new(library_path: Option<PathBuf>) -> Result<Self, ExtractionError> {
        let renderer = Self { library_path };
        renderer.bind()?;
        Ok(renderer)
    }

    fn bind(&self) -> Result<Pdfium, ExtractionError> {
        let configured = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_DYNAMIC_LIB_PATH").map(PathBuf::from));

        let bindings = match &configured {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ExtractionError::PdfRendering {
            page: 0,
            reason: match &configured {
                Some(path) => format!("cannot bind PDFium at {}: {e}", path.display()),
                None => format!("PDFium not installed (set PDFIUM_DYNAMIC_LIB_PATH): {e}"),
            },
        })?;

        Ok(Pdfium::new(bindings))
    }

    /// Open the policy PDF and hand it to `f`.
    fn with_policy<T>(
        &self,
        pdf_bytes: &[u8],
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, ExtractionError>,
    ) -> Result<T, ExtractionError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| match e {
                PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                    ExtractionError::Encrypted
                }
                other => ExtractionError::PdfRendering {
                    page: 0,
                    reason: format!("PDFium could not open the policy: {other}"),
                },
            })?;
        f(&document)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        self.with_policy(pdf_bytes, |doc| Ok(usize::from(doc.pages().len())))
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let page_number = page_index + 1;
        let render_error = |reason: String| ExtractionError::PdfRendering {
            page: page_number,
            reason,
        };

        self.with_policy(pdf_bytes, |doc| {
            let pages = doc.pages();
            let page = PdfPageIndex::try_from(page_index)
                .ok()
                .and_then(|i| pages.get(i).ok())
                .ok_or_else(|| render_error(format!("policy has {} pages", pages.len())))?;

            let config = PdfRenderConfig::new()
                .scale_page_by_factor(dpi as f32 / 72.0)
                .set_maximum_width(MAX_EDGE_PX)
                .set_maximum_height(MAX_EDGE_PX);
            let image = page
                .render_with_config(&config)
                .map_err(|e| render_error(e.to_string()))?
                .as_image();

            let png = encode_png(&image)?;
            debug!(
                page = page_number,
                dpi,
                width = image.width(),
                height = image.height(),
                bytes = png.len(),
                "Policy page rasterised"
            );
            Ok(png)
        })
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut png = Vec::new();
    image
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(png)
}

/// Stand-in renderer producing blank pages. Page width is `dpi / 10` pixels,
/// so tests can see which resolution was requested.
pub struct MockPdfPageRenderer {
    pages: usize,
}

impl MockPdfPageRenderer {
    pub fn new(pages: usize) -> Self {
        Self { pages }
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        Ok(self.pages)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        if page_index >= self.pages {
            return Err(ExtractionError::PdfRendering {
                page: page_index + 1,
                reason: format!("policy has {} pages", self.pages),
            });
        }
        encode_png(&DynamicImage::new_luma8((dpi / 10).max(1), 11))
    }
}
