use thiserror::Error;

use crate::schema::ExtractionRecord;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
#[error("malformed extraction output: {message}")]
pub struct ParseError {
    pub message: String,
    /// Start of the offending response, for logs.
    pub excerpt: String,
}

/// Parses a model response into a record.
///
/// Markdown code fences around the JSON are tolerated; anything that is not
/// a JSON object is rejected.
pub fn parse_extraction(raw: &str) -> Result<ExtractionRecord, ParseError> {
    let body = strip_code_fences(raw);

    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| ParseError {
        message: e.to_string(),
        excerpt: excerpt(raw),
    })?;

    if !value.is_object() {
        return Err(ParseError {
            message: "expected a JSON object".to_string(),
            excerpt: excerpt(raw),
        });
    }

    serde_json::from_value(value).map_err(|e| ParseError {
        message: e.to_string(),
        excerpt: excerpt(raw),
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_CHARS).collect()
}
