use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{DocumentType, SectionType};
use super::ValidationError;

/// A procedure or service the policy covers, and under which conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageCriterion {
    pub procedure_name: String,
    pub procedure_code: Option<String>,
    pub covered_scenarios: String,
    pub required_documentation: Option<String>,
    pub age_restrictions: Option<String>,
    pub frequency_limitations: Option<String>,
    pub prior_authorization_required: bool,
    pub confidence_score: f32,
}

/// Something the policy explicitly does not cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub excluded_procedure: String,
    pub exclusion_rationale: Option<String>,
    pub exceptions_to_exclusion: Option<String>,
    pub confidence_score: f32,
}

/// Structured result for one policy section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionExtraction {
    pub section_type: SectionType,
    pub title: String,
    pub section_number: Option<String>,
    pub content_summary: String,
    pub coverage_criteria: Vec<CoverageCriterion>,
    pub exclusions: Vec<Exclusion>,
    pub confidence_score: f32,
}

/// Aggregate root of a structured policy document.
///
/// Owns its sections and their criteria/exclusions outright; nothing in the
/// tree is shared with another extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyExtraction {
    pub policy_name: String,
    pub policy_number: Option<String>,
    pub payer_name: String,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub document_type: DocumentType,
    pub sections: Vec<SectionExtraction>,
    /// Self-reported by the structuring model; absent when it gave none.
    pub overall_confidence_score: Option<f32>,
}

impl PolicyExtraction {
    pub fn has_policy_name(&self) -> bool {
        !self.policy_name.trim().is_empty()
    }

    pub fn has_policy_number(&self) -> bool {
        self.policy_number
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty())
    }

    /// All coverage criteria across sections, in section order.
    pub fn coverage_criteria(&self) -> impl Iterator<Item = &CoverageCriterion> {
        self.sections.iter().flat_map(|s| s.coverage_criteria.iter())
    }

    /// All exclusions across sections, in section order.
    pub fn exclusions(&self) -> impl Iterator<Item = &Exclusion> {
        self.sections.iter().flat_map(|s| s.exclusions.iter())
    }

    /// Check the aggregate invariants. Violations are never coerced.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(score) = self.overall_confidence_score {
            check_confidence("overall_confidence_score", score)?;
        }

        for (i, section) in self.sections.iter().enumerate() {
            check_confidence(&format!("sections[{i}].confidence_score"), section.confidence_score)?;
            for (j, c) in section.coverage_criteria.iter().enumerate() {
                check_confidence(
                    &format!("sections[{i}].coverage_criteria[{j}].confidence_score"),
                    c.confidence_score,
                )?;
            }
            for (j, e) in section.exclusions.iter().enumerate() {
                check_confidence(
                    &format!("sections[{i}].exclusions[{j}].confidence_score"),
                    e.confidence_score,
                )?;
            }
        }

        if let (Some(effective), Some(expiration)) = (self.effective_date, self.expiration_date) {
            if expiration < effective {
                return Err(ValidationError::ExpirationBeforeEffective {
                    effective,
                    expiration,
                });
            }
        }

        Ok(())
    }
}

fn check_confidence(field: &str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::ConfidenceOutOfRange {
            field: field.to_string(),
            value,
        })
    }
}
