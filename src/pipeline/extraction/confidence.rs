use super::types::{OcrPageResult, OcrWordResult, PageText};

/// OCR confidence thresholds
pub mod thresholds {
    /// Below this: significant uncertainty on the page.
    pub const LOW: f32 = 0.50;

    /// Below this: some words should be checked by a reviewer.
    pub const MODERATE: f32 = 0.70;
}

/// Page confidence is the mean of recognised word confidences.
/// A page with no recognised words scores 0.0.
pub fn page_confidence(result: &OcrPageResult) -> f32 {
    if result.words.is_empty() {
        return 0.0;
    }
    let sum: f32 = result.words.iter().map(|w| w.confidence).sum();
    (sum / result.words.len() as f32).clamp(0.0, 1.0)
}

/// Words a reviewer should look at, with their page boxes when known.
pub fn low_confidence_words(result: &OcrPageResult, threshold: f32) -> Vec<&OcrWordResult> {
    result
        .words
        .iter()
        .filter(|w| w.confidence < threshold)
        .collect()
}

/// Length-weighted mean over OCR pages; `None` when no page carries a score.
pub fn document_ocr_confidence(pages: &[PageText]) -> Option<f32> {
    let scored: Vec<(&PageText, f32)> = pages
        .iter()
        .filter_map(|p| p.confidence.map(|c| (p, c)))
        .collect();
    if scored.is_empty() {
        return None;
    }

    let total_chars: usize = scored.iter().map(|(p, _)| p.char_count).sum();
    if total_chars == 0 {
        return Some(0.0);
    }
    let weighted: f32 = scored
        .iter()
        .map(|(p, c)| c * p.char_count as f32)
        .sum();
    Some(weighted / total_chars as f32)
}
