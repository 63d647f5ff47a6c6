use crate::models::PolicyExtraction;

use super::types::{QualityMetrics, ReviewDecision, ReviewReason, ReviewRule};

/// Returned when an extraction carries no confidence signal at all.
pub const NEUTRAL_CONFIDENCE: f32 = 0.5;

/// Below this many sections the extraction is treated as incomplete.
const MIN_EXPECTED_SECTIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerConfig {
    /// Minimum acceptable confidence, overall and per section.
    pub threshold: f32,
    /// A payer's first N policies always go to review.
    pub first_n_threshold: u32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            first_n_threshold: 5,
        }
    }
}

/// Aggregates confidence signals and applies the review rule set.
///
/// Pure: no I/O, never fails.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    config: ScorerConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ScorerConfig {
        self.config
    }

    /// Equal-weight mean of the available component means: self-reported
    /// document score, sections, criteria, exclusions. Each component counts
    /// once regardless of how many items feed it.
    pub fn calculate_overall_confidence(&self, extraction: &PolicyExtraction) -> f32 {
        let components = [
            extraction.overall_confidence_score,
            mean(extraction.sections.iter().map(|s| s.confidence_score)),
            mean(extraction.coverage_criteria().map(|c| c.confidence_score)),
            mean(extraction.exclusions().map(|e| e.confidence_score)),
        ];

        mean(components.into_iter().flatten())
            .unwrap_or(NEUTRAL_CONFIDENCE)
            .clamp(0.0, 1.0)
    }

    /// Apply the gate with the configured first-N threshold.
    pub fn evaluate(&self, extraction: &PolicyExtraction, payer_policy_count: u32) -> ReviewDecision {
        self.requires_manual_review(extraction, payer_policy_count, self.config.first_n_threshold)
    }

    /// Evaluate every rule in order; any rule that fires forces review and
    /// contributes exactly one reason.
    pub fn requires_manual_review(
        &self,
        extraction: &PolicyExtraction,
        payer_policy_count: u32,
        first_n_threshold: u32,
    ) -> ReviewDecision {
        let threshold = self.config.threshold;
        let mut reasons = Vec::new();
        let mut fire = |rule: ReviewRule, message: String| {
            reasons.push(ReviewReason { rule, message });
        };

        if payer_policy_count < first_n_threshold {
            fire(
                ReviewRule::FirstPoliciesForPayer,
                format!("First {first_n_threshold} policies per payer require manual review"),
            );
        }

        let overall_confidence = self.calculate_overall_confidence(extraction);
        if overall_confidence < threshold {
            fire(
                ReviewRule::LowOverallConfidence,
                format!("Overall confidence ({overall_confidence:.2}) below threshold ({threshold})"),
            );
        }

        if !extraction.has_policy_name() {
            fire(ReviewRule::MissingPolicyName, "Missing policy name".into());
        }

        if extraction.effective_date.is_none() {
            fire(ReviewRule::MissingEffectiveDate, "Missing effective date".into());
        }

        if extraction.sections.is_empty() {
            fire(ReviewRule::NoSections, "No sections extracted".into());
        } else if extraction.sections.len() < MIN_EXPECTED_SECTIONS {
            fire(
                ReviewRule::FewSections,
                "Very few sections extracted (possible incomplete extraction)".into(),
            );
        }

        let low_confidence_sections = extraction
            .sections
            .iter()
            .filter(|s| s.confidence_score < threshold)
            .count();
        if low_confidence_sections > 0 {
            fire(
                ReviewRule::LowConfidenceSections,
                format!("{low_confidence_sections} sections with low confidence"),
            );
        }

        ReviewDecision {
            requires_review: !reasons.is_empty(),
            reasons,
            overall_confidence,
            low_confidence_sections,
        }
    }

    pub fn get_quality_metrics(&self, extraction: &PolicyExtraction) -> QualityMetrics {
        QualityMetrics {
            overall_confidence: self.calculate_overall_confidence(extraction),
            section_count: extraction.sections.len(),
            coverage_criteria_count: extraction.coverage_criteria().count(),
            exclusion_count: extraction.exclusions().count(),
            has_policy_name: extraction.has_policy_name(),
            has_effective_date: extraction.effective_date.is_some(),
            has_policy_number: extraction.has_policy_number(),
            avg_section_confidence: mean(extraction.sections.iter().map(|s| s.confidence_score))
                .unwrap_or(0.0),
        }
    }
}

fn mean(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0f32, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f32)
}
