use serde_json::{json, Value};

use crate::models::{DocumentType, SectionType};

fn confidence(description: &str) -> Value {
    json!({
        "type": "number",
        "minimum": 0.0,
        "maximum": 1.0,
        "description": description,
    })
}

fn nullable_string(description: &str) -> Value {
    json!({ "type": ["string", "null"], "description": description })
}

fn criterion_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "procedure_name": { "type": "string", "description": "Name of the medical procedure or service" },
            "procedure_code": nullable_string("CPT or HCPCS code if mentioned"),
            "covered_scenarios": { "type": "string", "description": "When the procedure is covered" },
            "required_documentation": nullable_string("Documentation required for coverage"),
            "prior_authorization_required": { "type": "boolean" },
            "age_restrictions": nullable_string("Age restrictions, e.g. '18-65 years'"),
            "frequency_limitations": nullable_string("Frequency limits, e.g. 'once per year'"),
            "confidence_score": confidence("Confidence in this criterion (0.0-1.0)"),
        },
        "required": ["procedure_name", "covered_scenarios", "prior_authorization_required", "confidence_score"],
    })
}

fn exclusion_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "excluded_procedure": { "type": "string", "description": "What is excluded from coverage" },
            "exclusion_rationale": nullable_string("Why it is excluded"),
            "exceptions_to_exclusion": nullable_string("When the exclusion does not apply"),
            "confidence_score": confidence("Confidence in this exclusion (0.0-1.0)"),
        },
        "required": ["excluded_procedure", "confidence_score"],
    })
}

/// Schema for a single section extraction.
pub fn section_schema() -> Value {
    let section_types: Vec<&str> = SectionType::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "section_type": { "type": "string", "enum": section_types },
            "title": { "type": "string" },
            "section_number": nullable_string("Section number if present, e.g. '2.1.3'"),
            "content_summary": { "type": "string", "description": "Brief summary of the section" },
            "coverage_criteria": { "type": "array", "items": criterion_schema() },
            "exclusions": { "type": "array", "items": exclusion_schema() },
            "confidence_score": confidence("Confidence in the section extraction (0.0-1.0)"),
        },
        "required": ["section_type", "title", "content_summary", "coverage_criteria", "exclusions", "confidence_score"],
    })
}

/// Schema for a whole-document extraction.
pub fn policy_schema() -> Value {
    let document_types: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "policy_name": { "type": "string", "description": "Official policy name or title" },
            "policy_number": nullable_string("Policy number or identifier"),
            "payer_name": { "type": "string" },
            "effective_date": nullable_string("Effective date, YYYY-MM-DD"),
            "expiration_date": nullable_string("Expiration date, YYYY-MM-DD"),
            "document_type": { "type": "string", "enum": document_types },
            "sections": { "type": "array", "items": section_schema() },
            "overall_confidence_score": confidence("Confidence in the whole extraction (0.0-1.0)"),
        },
        "required": ["policy_name", "payer_name", "effective_date", "document_type", "sections", "overall_confidence_score"],
    })
}
