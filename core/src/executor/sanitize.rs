//! Cleanup of raw program output.

use lazy_static::lazy_static;
use regex::Regex;

/// Prepended to requests that expect structured output.
pub const STRUCTURED_OUTPUT_INSTRUCTION: &str = "You are a helpful assistant that generates \
structured JSON responses for software project configuration. Always respond with valid JSON \
that matches the requested schema. Do not include any markdown formatting or code blocks - \
just the raw JSON.";

const FENCE: &str = "```";

lazy_static! {
    static ref FENCE_OPEN: Regex =
        Regex::new(r"```([A-Za-z0-9_+.\-]*)").expect("FENCE_OPEN is valid");
}

/// Joins the structured-output instruction and the request.
pub fn compose_request(request: &str, expect_structured: bool) -> String {
    if expect_structured {
        format!("{STRUCTURED_OUTPUT_INSTRUCTION}\n\n{request}")
    } else {
        request.to_string()
    }
}

/// Unwraps the first fenced block, or returns the trimmed text.
///
/// A tag right after the opening fence (` ```json `) is dropped when it is
/// `json` or ends the line. An unclosed fence leaves the text as is.
pub fn sanitize_output(raw: &str) -> String {
    let text = raw.trim();

    let Some(open) = FENCE_OPEN.captures(text) else {
        return text.to_string();
    };
    let (Some(fence), Some(tag)) = (open.get(0), open.get(1)) else {
        return text.to_string();
    };

    let after_tag = &text[tag.end()..];
    let body_start = if tag.as_str() == "json" || after_tag.starts_with(&['\n', '\r'][..]) {
        tag.end()
    } else {
        fence.start() + FENCE.len()
    };

    match text[body_start..].find(FENCE) {
        Some(len) => text[body_start..body_start + len].trim().to_string(),
        None => text.to_string(),
    }
}

/// Advisory JSON check; `Err` carries the parser message.
pub fn validate_structured(text: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}
