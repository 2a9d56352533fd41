//! LLM prompt construction for extraction and verification

use veracity_domain::DocumentContext;

/// Builds the prompt asking for atomic statements in one chunk
pub struct ExtractionPrompt<'a> {
    content: &'a str,
    context: &'a DocumentContext,
}

impl<'a> ExtractionPrompt<'a> {
    /// Create a new prompt builder
    pub fn new(content: &'a str, context: &'a DocumentContext) -> Self {
        Self { content, context }
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        prompt.push_str(&format!("Document: {}\n", self.context.name));
        if let Some(title) = &self.context.title {
            prompt.push_str(&format!("Title: {}\n", title));
        }
        if let Some(source) = &self.context.source_url {
            prompt.push_str(&format!("Source: {}\n", source));
        }
        prompt.push('\n');

        prompt.push_str("Text to analyze:\n");
        prompt.push_str("---\n");
        prompt.push_str(self.content);
        prompt.push_str("\n---\n\n");

        prompt.push_str(EXTRACTION_OUTPUT_FORMAT);
        prompt
    }
}

/// Builds the prompt asking whether a statement is supported by its source
pub struct VerificationPrompt<'a> {
    statement: &'a str,
    source: &'a str,
}

impl<'a> VerificationPrompt<'a> {
    /// Create a new prompt builder
    pub fn new(statement: &'a str, source: &'a str) -> Self {
        Self { statement, source }
    }

    /// Build the complete verification prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(VERIFICATION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        prompt.push_str("Source text:\n");
        prompt.push_str("---\n");
        prompt.push_str(self.source);
        prompt.push_str("\n---\n\n");

        prompt.push_str("Statement to verify:\n");
        prompt.push_str(self.statement);
        prompt.push_str("\n\n");

        prompt.push_str(VERIFICATION_OUTPUT_FORMAT);
        prompt
    }
}

/// JSON schema hint passed to providers with structured output
pub const STATEMENTS_SCHEMA: &str = r#"{"type":"array","items":{"type":"string"}}"#;

/// JSON schema hint for verdicts
pub const VERDICT_SCHEMA: &str = r#"{"type":"object","properties":{"accepted":{"type":"boolean"},"reason":{"type":["string","null"]}},"required":["accepted"]}"#;

const EXTRACTION_INSTRUCTIONS: &str = r#"Extract discrete, verifiable factual statements from the following text.

Rules:
- One fact per statement
- Each statement must stand alone: resolve pronouns and name the subject
- Keep numbers, dates and units exactly as written
- Include temporal context when present ("as of 2023", "since 2019")
- Skip opinions, speculation, questions and instructions
- Do not add knowledge that is not in the text
- If the text contains no facts, return an empty array"#;

const EXTRACTION_OUTPUT_FORMAT: &str = r#"Output format (JSON array of strings only, no additional text):
["First statement.", "Second statement."]

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

const VERIFICATION_INSTRUCTIONS: &str = r#"Decide whether the statement below is fully supported by the source text.

Rules:
- Accept only if every part of the statement follows from the source text
- Reject statements that add, exaggerate or contradict information
- Reject statements that depend on knowledge outside the source text
- When rejecting, give a short reason"#;

const VERIFICATION_OUTPUT_FORMAT: &str = r#"Output format (JSON object only, no additional text):
{"accepted": true, "reason": null}
or
{"accepted": false, "reason": "unsupported by source"}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;
