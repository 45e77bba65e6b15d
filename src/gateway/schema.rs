//! The fixed instruction and response contract for work analysis.
//!
//! The model is asked for JSON matching [`response_schema`]; the reply
//! is then decoded strictly by [`parse_analysis`]. Anything that does not
//! fit the schema is rejected as a whole.

use crate::models::{Analysis, ErrorCategory};
use serde_json::{json, Value};

/// Instruction sent alongside every image.
const ANALYSIS_INSTRUCTION: &str = r#"Analyze the handwriting or text in this image of a student's school work.
Identify specific errors in grammar, spelling, punctuation, capitalization, and syntax.

If the image is not readable or does not contain text, return an empty error list and a summary stating that. Do not invent errors.

For each error found:
1. Quote the exact original text containing the error.
2. Provide the corrected version.
3. Categorize it into one of these types: Spelling, Grammar, Punctuation, Capitalization, Syntax, Vocabulary, Other.
4. Provide a brief, helpful explanation suitable for a teacher to use.

Also provide a brief 1-2 sentence summary of the overall work quality."#;

/// The instruction text for the model.
pub fn instruction() -> &'static str {
    ANALYSIS_INSTRUCTION
}

/// Response schema in the model API's schema dialect.
pub fn response_schema() -> Value {
    let categories: Vec<&str> = ErrorCategory::ALL.iter().map(|c| c.as_str()).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "errors": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "originalText": { "type": "STRING" },
                        "correction": { "type": "STRING" },
                        "category": { "type": "STRING", "enum": categories },
                        "explanation": { "type": "STRING" }
                    },
                    "required": ["originalText", "correction", "category", "explanation"]
                }
            }
        },
        "required": ["summary", "errors"]
    })
}

/// Decode the model's JSON text into an [`Analysis`].
///
/// Every field is required and `category` must be one of the fixed
/// names, so a reply is either fully decoded or rejected.
pub fn parse_analysis(text: &str) -> Result<Analysis, serde_json::Error> {
    serde_json::from_str(text)
}
