use crate::models::SectionType;

/// Title keyword groups, checked in order. First group with a hit wins.
const TITLE_RULES: &[(&[&str], SectionType)] = &[
    (&["coverage", "benefits"], SectionType::CoverageCriteria),
    (&["exclusion", "excluded", "not covered"], SectionType::Exclusions),
    (
        &["requirement", "documentation", "medical necessity"],
        SectionType::Requirements,
    ),
    (&["definition", "terms", "glossary"], SectionType::Definitions),
    (
        &["prior authorization", "pre-authorization", "preauth"],
        SectionType::PriorAuthorization,
    ),
    (&["limitation", "limit", "frequency"], SectionType::Limitations),
    (&["appeal", "grievance", "dispute"], SectionType::AppealsProcess),
];

/// Body keyword groups, consulted only when the title says nothing.
const CONTENT_RULES: &[(&[&str], SectionType)] = &[
    (&["not covered", "excluded"], SectionType::Exclusions),
    (
        &["covered when", "coverage criteria"],
        SectionType::CoverageCriteria,
    ),
];

/// Label a section from its title, falling back to its body text.
/// Case-insensitive substring matching; deterministic.
pub fn classify_section(title: &str, text: &str) -> SectionType {
    let title = title.to_lowercase();
    if let Some(section_type) = first_match(&title, TITLE_RULES) {
        return section_type;
    }

    let text = text.to_lowercase();
    first_match(&text, CONTENT_RULES).unwrap_or(SectionType::Other)
}

fn first_match(haystack: &str, rules: &[(&[&str], SectionType)]) -> Option<SectionType> {
    rules
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(_, section_type)| *section_type)
}
