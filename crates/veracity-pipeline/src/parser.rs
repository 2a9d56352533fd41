//! Parse LLM output into statements and verdicts

use crate::error::CollaboratorError;
use serde_json::Value;
use tracing::warn;
use veracity_domain::Verdict;

/// Reason recorded when a model rejects without saying why
pub const UNSPECIFIED_REASON: &str = "no reason given";

/// Parse an extraction response into statements
///
/// Accepts a JSON array of strings, an array of `{"statement": ...}`
/// objects, or an object holding such an array under `statements` or
/// `facts`. Items of any other shape are skipped.
pub fn parse_statements(response: &str) -> Result<Vec<String>, CollaboratorError> {
    let json: Value = serde_json::from_str(extract_json(response)?)?;

    let items = match &json {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("statements")
            .or_else(|| obj.get("facts"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CollaboratorError::MalformedResponse(
                    "Expected a JSON array of statements".to_string(),
                )
            })?,
        _ => {
            return Err(CollaboratorError::MalformedResponse(
                "Expected a JSON array of statements".to_string(),
            ))
        }
    };

    let mut statements = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let statement = match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("statement")
                .or_else(|| obj.get("fact"))
                .and_then(Value::as_str),
            _ => None,
        };
        match statement {
            Some(s) => statements.push(s.to_string()),
            None => warn!("Skipping statement {}: not a string or statement object", idx),
        }
    }

    Ok(statements)
}

/// Parse a verification response into a verdict
///
/// The decision comes from a boolean `accepted` (or `verified`) field, or a
/// `verdict` string. `reason` may be a string or null.
pub fn parse_verdict(response: &str) -> Result<Verdict, CollaboratorError> {
    let json: Value = serde_json::from_str(extract_json(response)?)?;
    let obj = json.as_object().ok_or_else(|| {
        CollaboratorError::MalformedResponse("Expected a JSON verdict object".to_string())
    })?;

    let accepted = match obj.get("accepted").or_else(|| obj.get("verified")) {
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(CollaboratorError::MalformedResponse(
                "'accepted' must be a boolean".to_string(),
            ))
        }
        None => match obj.get("verdict").and_then(Value::as_str) {
            Some(v) => parse_verdict_word(v)?,
            None => {
                return Err(CollaboratorError::MalformedResponse(
                    "Missing 'accepted' field".to_string(),
                ))
            }
        },
    };

    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(match (accepted, reason) {
        (true, reason) => Verdict {
            accepted: true,
            reason,
        },
        (false, Some(reason)) => Verdict::reject(reason),
        (false, None) => Verdict::reject(UNSPECIFIED_REASON),
    })
}

fn parse_verdict_word(word: &str) -> Result<bool, CollaboratorError> {
    match word.trim().to_lowercase().as_str() {
        "accepted" | "accept" | "verified" | "supported" | "true" => Ok(true),
        "rejected" | "reject" | "unsupported" | "false" => Ok(false),
        other => Err(CollaboratorError::MalformedResponse(format!(
            "Unknown verdict '{}'",
            other
        ))),
    }
}

/// Extract JSON from response, handling markdown code blocks and
/// surrounding prose
fn extract_json(response: &str) -> Result<&str, CollaboratorError> {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let body = trimmed
            .split_once('\n')
            .map(|(_, rest)| rest)
            .ok_or_else(|| CollaboratorError::MalformedResponse("Empty code block".to_string()))?;
        let body = body.trim_end();
        return Ok(body.strip_suffix("```").unwrap_or(body).trim());
    }

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return Ok(trimmed);
    }

    // Prose around the payload: take the outermost bracketed region
    let open = trimmed.find(['[', '{']);
    let close = trimmed.rfind([']', '}']);
    match (open, close) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(CollaboratorError::MalformedResponse(
            "No JSON found in response".to_string(),
        )),
    }
}
