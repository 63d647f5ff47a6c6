use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use super::StructuringError;
use crate::models::{
    CoverageCriterion, DocumentType, Exclusion, PolicyExtraction, SectionExtraction, SectionType,
};

/// Date layouts accepted from model output, ISO first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d", "%B %d, %Y"];

#[derive(Deserialize)]
struct RawCriterion {
    procedure_name: String,
    procedure_code: Option<String>,
    #[serde(default)]
    covered_scenarios: String,
    required_documentation: Option<String>,
    age_restrictions: Option<String>,
    frequency_limitations: Option<String>,
    #[serde(default)]
    prior_authorization_required: bool,
    confidence_score: f32,
}

#[derive(Deserialize)]
struct RawExclusion {
    excluded_procedure: String,
    exclusion_rationale: Option<String>,
    exceptions_to_exclusion: Option<String>,
    confidence_score: f32,
}

#[derive(Deserialize)]
struct RawSection {
    section_type: String,
    title: String,
    section_number: Option<String>,
    #[serde(default)]
    content_summary: String,
    #[serde(default)]
    coverage_criteria: Vec<RawCriterion>,
    #[serde(default)]
    exclusions: Vec<RawExclusion>,
    confidence_score: f32,
}

#[derive(Deserialize)]
struct RawPolicy {
    policy_name: Option<String>,
    policy_number: Option<String>,
    payer_name: Option<String>,
    effective_date: Option<String>,
    expiration_date: Option<String>,
    document_type: Option<String>,
    sections: Vec<RawSection>,
    overall_confidence_score: Option<f32>,
}

/// Decode model text into JSON, tolerating a ```json fence around it.
pub fn parse_json_payload(content: &str) -> Result<Value, StructuringError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| StructuringError::MalformedResponse(format!("not valid JSON: {e}")))
}

/// Schema-check a whole-document response.
///
/// A missing payer falls back to the job's payer name; a missing policy name
/// becomes empty so the review gate can flag it.
pub fn parse_policy(value: Value, payer_fallback: &str) -> Result<PolicyExtraction, StructuringError> {
    let raw: RawPolicy = serde_json::from_value(value)
        .map_err(|e| StructuringError::SchemaViolation(e.to_string()))?;

    let overall_confidence_score = raw
        .overall_confidence_score
        .map(|c| check_confidence("overall_confidence_score", c))
        .transpose()?;

    let sections = raw
        .sections
        .into_iter()
        .enumerate()
        .map(|(i, s)| convert_section(s, &format!("sections[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let payer_name = raw
        .payer_name
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| payer_fallback.to_string());

    Ok(PolicyExtraction {
        policy_name: raw.policy_name.unwrap_or_default().trim().to_string(),
        policy_number: non_blank(raw.policy_number),
        payer_name,
        effective_date: parse_date("effective_date", raw.effective_date.as_deref())?,
        expiration_date: parse_date("expiration_date", raw.expiration_date.as_deref())?,
        document_type: raw
            .document_type
            .as_deref()
            .map(DocumentType::classify)
            .unwrap_or(DocumentType::Other),
        sections,
        overall_confidence_score,
    })
}

/// Schema-check a single-section response.
pub fn parse_section(value: Value) -> Result<SectionExtraction, StructuringError> {
    let raw: RawSection = serde_json::from_value(value)
        .map_err(|e| StructuringError::SchemaViolation(e.to_string()))?;
    convert_section(raw, "section")
}

fn convert_section(raw: RawSection, path: &str) -> Result<SectionExtraction, StructuringError> {
    let section_type = parse_section_type(&raw.section_type).ok_or_else(|| {
        StructuringError::SchemaViolation(format!(
            "{path}.section_type: unknown value '{}'",
            raw.section_type
        ))
    })?;

    let confidence_score = check_confidence(&format!("{path}.confidence_score"), raw.confidence_score)?;

    let coverage_criteria = raw
        .coverage_criteria
        .into_iter()
        .enumerate()
        .map(|(j, c)| {
            Ok(CoverageCriterion {
                confidence_score: check_confidence(
                    &format!("{path}.coverage_criteria[{j}].confidence_score"),
                    c.confidence_score,
                )?,
                procedure_name: c.procedure_name,
                procedure_code: non_blank(c.procedure_code),
                covered_scenarios: c.covered_scenarios,
                required_documentation: non_blank(c.required_documentation),
                age_restrictions: non_blank(c.age_restrictions),
                frequency_limitations: non_blank(c.frequency_limitations),
                prior_authorization_required: c.prior_authorization_required,
            })
        })
        .collect::<Result<Vec<_>, StructuringError>>()?;

    let exclusions = raw
        .exclusions
        .into_iter()
        .enumerate()
        .map(|(j, e)| {
            Ok(Exclusion {
                confidence_score: check_confidence(
                    &format!("{path}.exclusions[{j}].confidence_score"),
                    e.confidence_score,
                )?,
                excluded_procedure: e.excluded_procedure,
                exclusion_rationale: non_blank(e.exclusion_rationale),
                exceptions_to_exclusion: non_blank(e.exceptions_to_exclusion),
            })
        })
        .collect::<Result<Vec<_>, StructuringError>>()?;

    Ok(SectionExtraction {
        section_type,
        title: raw.title,
        section_number: non_blank(raw.section_number),
        content_summary: raw.content_summary,
        coverage_criteria,
        exclusions,
        confidence_score,
    })
}

/// Accepts `COVERAGE_CRITERIA`, `coverage_criteria` and `Coverage Criteria`.
fn parse_section_type(raw: &str) -> Option<SectionType> {
    let normalized = raw.trim().to_uppercase().replace([' ', '-'], "_");
    SectionType::from_str(&normalized).ok()
}

fn check_confidence(field: &str, value: f32) -> Result<f32, StructuringError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(StructuringError::SchemaViolation(format!(
            "{field}: {value} is outside [0, 1]"
        )))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Parse a model-supplied date in any of `DATE_FORMATS`.
///
/// Absent, blank or `null` means no date. Any other text that matches no
/// layout is a schema violation, so the call is retried.
pub fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, StructuringError> {
    let Some(raw) = raw
        .map(str::trim)
        .filter(|r| !r.is_empty() && !r.eq_ignore_ascii_case("null"))
    else {
        return Ok(None);
    };

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(Some)
        .ok_or_else(|| {
            tracing::warn!(field, value = raw, "Unparseable date in structuring output");
            StructuringError::SchemaViolation(format!("{field}: unparseable date '{raw}'"))
        })
}
