//! Prompt text sent to the model.

/// System instruction for epic breakdowns. This is the only thing keeping
/// the model's answer parseable; the parser does not repair output.
pub const EPIC_SYSTEM_INSTRUCTION: &str = "You are a senior product manager and technical lead. \
Break epics down into structured, actionable work items. \
Answer with a valid JSON array only, without markdown fences or commentary.";

/// System instruction for requirement reviews.
pub const REQUIREMENTS_SYSTEM_INSTRUCTION: &str =
    "You are a requirements analyst. Be concise and actionable.";

/// Build the breakdown prompt for an epic description.
pub fn epic_breakdown_prompt(input: &str) -> String {
    format!(
        r#"Input: {input}

Break this input down into work items and return them as a JSON array.
Each element must be an object with these fields:
- "summary": a clear, concise title (at most 100 characters)
- "description": a detailed description including acceptance criteria
- "issue_type": one of "Story", "Task" or "Bug"

Return ONLY the JSON array, with no text before or after it.
Example:
[
  {{
    "summary": "Implement user login",
    "description": "As a user, I want to log in...\n\nAcceptance Criteria:\n- ...",
    "issue_type": "Story"
  }}
]"#
    )
}

/// Build the review prompt for a single requirement.
pub fn requirements_review_prompt(text: &str) -> String {
    format!(
        "Evaluate the following requirement:\n\n{text}\n\n\
         Assess it for:\n\
         1. Clarity: is it unambiguous?\n\
         2. Completeness: are acceptance criteria implied or missing?\n\
         3. Testability: can QA write tests from it?\n\n\
         Give a short verdict and suggestions for improvement."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epic_prompt_embeds_input_and_format_contract() {
        let prompt = epic_breakdown_prompt("Checkout with saved cards");
        assert!(prompt.starts_with("Input: Checkout with saved cards\n"));
        assert!(prompt.contains("JSON array"));
        assert!(prompt.contains("\"issue_type\""));
        assert!(prompt.contains("Return ONLY the JSON array"));
    }

    #[test]
    fn test_epic_prompt_example_is_valid_json() {
        let prompt = epic_breakdown_prompt("x");
        let start = prompt.find("[\n").unwrap();
        let example = &prompt[start..];
        let items = crate::parser::parse_work_items(example).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].summary, "Implement user login");
    }

    #[test]
    fn test_requirements_prompt_embeds_text() {
        let prompt = requirements_review_prompt("The system shall be fast.");
        assert!(prompt.contains("The system shall be fast."));
        assert!(prompt.contains("Testability"));
    }
}
