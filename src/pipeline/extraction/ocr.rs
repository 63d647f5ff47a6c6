use super::types::{OcrEngine, OcrPageResult, OcrWordResult};
use super::ExtractionError;

/// Tesseract engine through leptess.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractEngine {
    tessdata_dir: Option<std::path::PathBuf>,
    languages: String,
}

#[cfg(feature = "ocr")]
impl TesseractEngine {
    /// Verify Tesseract initializes with the requested languages.
    /// `tessdata_dir = None` uses the engine's compiled-in search path.
    pub fn new(
        tessdata_dir: Option<&std::path::Path>,
        languages: &str,
    ) -> Result<Self, ExtractionError> {
        let engine = Self {
            tessdata_dir: tessdata_dir.map(|p| p.to_path_buf()),
            languages: languages.to_string(),
        };
        let _ = engine.init()?;
        Ok(engine)
    }

    fn init(&self) -> Result<leptess::LepTess, ExtractionError> {
        let datapath = match &self.tessdata_dir {
            Some(dir) => Some(
                dir.to_str()
                    .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?,
            ),
            None => None,
        };
        leptess::LepTess::new(datapath, &self.languages).map_err(|e| {
            ExtractionError::OcrInit(format!(
                "Tesseract could not load '{}': {e}",
                self.languages
            ))
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let mut lt = self.init()?;

        lt.set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("Failed to load page image: {e}")))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| ExtractionError::OcrProcessing(e.to_string()))?;

        let tsv = lt
            .get_tsv_text(0)
            .map_err(|e| ExtractionError::OcrProcessing(e.to_string()))?;

        Ok(OcrPageResult {
            text,
            words: parse_tsv_words(&tsv),
        })
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let words = self
            .text
            .split_whitespace()
            .map(|w| OcrWordResult {
                text: w.to_string(),
                confidence: self.confidence,
            })
            .collect();

        Ok(OcrPageResult {
            text: self.text.clone(),
            words,
        })
    }
}

/// Parse Tesseract TSV output into recognised words.
///
/// TSV columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Only level, conf and text are read. Level 5 rows are words. Confidence is 0-100, scaled
/// to 0.0-1.0. Rows with conf -1 were never scored and are not words.
pub fn parse_tsv_words(tsv: &str) -> Vec<OcrWordResult> {
    let mut results = Vec::new();

    for line in tsv.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // Header row fails this parse too
        let level: i32 = match fields[0].parse() {
            Ok(l) => l,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }

        let conf: f32 = match fields[10].trim().parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        if conf < 0.0 {
            continue;
        }

        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }

        results.push(OcrWordResult {
            text: word.to_string(),
            confidence: (conf / 100.0).clamp(0.0, 1.0),
        });
    }

    results
}
