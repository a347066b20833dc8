use crate::retrieval::RETRIEVE_CONTEXT;

pub const DEFAULT_PERSONA: &str =
    "You are a professor at Delhi Technological University grading physics exam sheets.";

const DELIMITER: &str = "────────────────────────────────────────────────────────────────────────────────";

/// Grading instructions for one section, using the default persona.
pub fn build_prompt(section_name: &str, section_description: &str) -> String {
    render_prompt(DEFAULT_PERSONA, section_name, section_description)
}

/// Grading instructions for one section.
///
/// The output format is what `scoring::extract_scores` reads back; nothing
/// else enforces it.
pub fn render_prompt(persona: &str, section_name: &str, section_description: &str) -> String {
    format!(
        r#"
{persona}

SECTION TO GRADE: {section_name}
{section_description}

GRADING RUBRIC (follow strictly):
- Full marks: Answer is completely correct with proper methodology
- 75% marks: Answer is mostly correct with minor errors
- 50% marks: Answer shows understanding but has significant errors
- 25% marks: Answer shows some attempt but major conceptual errors
- 0 marks: No answer, completely wrong, or irrelevant

INSTRUCTIONS:
1. Analyze ONLY the {section_name} in the provided exam sheet images
2. Use the {RETRIEVE_CONTEXT} tool to fetch the marking scheme for this section
3. Compare each answer against the marking scheme
4. Award marks based on the rubric above
5. Ignore rough work - only grade final answers
6. Be consistent in your grading

OUTPUT FORMAT (strictly follow):
For EVERY question in this section, use this EXACT format:

Question X: [Marks Awarded]/[Total Marks Available]
{DELIMITER}
Student's Answer:
[Brief summary of what the student wrote]

Expected Answer (from Marking Scheme):
[Key points from the marking scheme]

Evaluation:
✓ Correct: [What was correct]
✗ Missing/Incorrect: [What was wrong or missing]

Marks Breakdown:
[Explain how marks were distributed based on the rubric]
{DELIMITER}
"#
    )
}
