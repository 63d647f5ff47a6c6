use serde::{Deserialize, Serialize};

/// Gate rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewRule {
    FirstPoliciesForPayer,
    LowOverallConfidence,
    MissingPolicyName,
    MissingEffectiveDate,
    NoSections,
    FewSections,
    LowConfidenceSections,
}

/// One fired rule and its human-readable explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReason {
    pub rule: ReviewRule,
    pub message: String,
}

/// Outcome of the review gate. Always recomputed from an extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub requires_review: bool,
    pub reasons: Vec<ReviewReason>,
    pub overall_confidence: f32,
    pub low_confidence_sections: usize,
}

impl ReviewDecision {
    /// Reason messages in rule order.
    pub fn messages(&self) -> Vec<&str> {
        self.reasons.iter().map(|r| r.message.as_str()).collect()
    }

    pub fn fired(&self, rule: ReviewRule) -> bool {
        self.reasons.iter().any(|r| r.rule == rule)
    }
}

/// Diagnostic snapshot of an extraction. Not used for gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub overall_confidence: f32,
    pub section_count: usize,
    pub coverage_criteria_count: usize,
    pub exclusion_count: usize,
    pub has_policy_name: bool,
    pub has_effective_date: bool,
    pub has_policy_number: bool,
    pub avg_section_confidence: f32,
}
