//! Schema generation: instruction building and output parsing.
//!
//! The model call itself is behind [`SchemaGenerator`]; this module only
//! decides what to send and how to read the answer back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::RetrievalResult;

/// A text-generation backend.
#[async_trait]
pub trait SchemaGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-pro"`).
    fn model_name(&self) -> &str;

    /// Send `instruction` to the model and return its raw text answer.
    async fn complete(&self, instruction: &str) -> Result<String>;
}

/// Build the instruction sent to the generation model.
///
/// `context` is embedded as pretty-printed JSON; an empty context still
/// produces a valid instruction and the model falls back to general
/// knowledge.
pub fn build_instruction(prompt: &str, context: &[RetrievalResult]) -> Result<String> {
    let history =
        serde_json::to_string_pretty(context).context("failed to serialize form history")?;

    Ok(format!(
        r#"You are an intelligent form schema generator.

Relevant form history:
{history}

Generate a JSON schema for this request:
"{prompt}"

Respond with a single JSON object and nothing else, shaped like:
{{
  "title": "string",
  "description": "string (optional)",
  "fields": [
    {{
      "id": "unique_snake_case_id",
      "label": "string",
      "type": "text | textarea | email | number | tel | url | date | select | radio | checkbox | file",
      "placeholder": "string (optional)",
      "required": true,
      "options": ["only for select, radio, checkbox"],
      "validation": {{ "min": 0, "max": 100, "minLength": 1, "maxLength": 200 }}
    }}
  ]
}}
"#
    ))
}

/// Parse the model's raw answer as a JSON document.
///
/// A single Markdown code fence around the JSON is tolerated. Nothing else
/// is repaired: non-JSON output is an error.
pub fn parse_schema_output(text: &str) -> Result<Value> {
    let body = strip_code_fence(text.trim());
    serde_json::from_str(body).context("generation model returned malformed JSON")
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim(),
        None => rest.trim(),
    }
}

/// Generate a schema document for `prompt` using `context` as history.
pub async fn generate_schema(
    generator: &dyn SchemaGenerator,
    prompt: &str,
    context: &[RetrievalResult],
) -> Result<Value> {
    let instruction = build_instruction(prompt, context)?;
    let raw = generator
        .complete(&instruction)
        .await
        .context("schema generation call failed")?;
    parse_schema_output(&raw)
}
