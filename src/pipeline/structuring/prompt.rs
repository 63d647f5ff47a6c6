use crate::pipeline::chunking::ClassifiedChunk;

pub const POLICY_SYSTEM_PROMPT: &str = "\
You are an expert at extracting structured information from healthcare policy documents.

Your task is to:
1. Identify the policy name, number, payer, and dates
2. Categorize sections by type (coverage criteria, exclusions, requirements, etc.)
3. Extract specific coverage criteria including procedure names, codes, and conditions
4. Extract exclusions with rationale
5. Provide confidence scores for each extraction (0.0-1.0)

Be precise and conservative with confidence scores. If information is unclear or ambiguous, \
reflect that in lower confidence scores.

For dates, use ISO format (YYYY-MM-DD).
For procedure codes, use standard CPT/HCPCS codes if mentioned.";

pub const SECTION_SYSTEM_PROMPT: &str = "\
You are an expert at extracting structured information from policy document sections.

Analyze the section and extract:
1. Section type (COVERAGE_CRITERIA, EXCLUSIONS, REQUIREMENTS, etc.)
2. Title and section number
3. Coverage criteria with specific details
4. Exclusions with rationale
5. Confidence score for the extraction

Be thorough but precise. Extract all relevant coverage criteria and exclusions mentioned in the section.";

/// Build the user prompt for a whole-document call.
///
/// When the chunker found headings, their titles and heuristic labels are
/// listed first so the model can anchor its section split on them.
pub fn build_policy_prompt(text: &str, payer_name: &str, outline: &[ClassifiedChunk]) -> String {
    let mut prompt = format!("Payer: {payer_name}\n\n");

    if !outline.is_empty() {
        prompt.push_str("Detected sections (heuristic, may be incomplete):\n");
        for entry in outline {
            prompt.push_str(&format!(
                "- {} [{}]\n",
                entry.chunk.title,
                entry.section_type.as_str()
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str("Document:\n");
    prompt.push_str(text);
    prompt
}

/// Build the user prompt for a single-section call.
pub fn build_section_prompt(title: &str, text: &str) -> String {
    format!("Section Title: {title}\n\nContent:\n{text}")
}
