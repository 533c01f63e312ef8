//! Locating structured data inside free-form model output.
//!
//! Models wrap JSON in markdown fences, lead with a sentence of preamble or
//! trail off with commentary. These helpers find the structured part.

use scriptorium_error::{JsonError, ShapeError, ShapeErrorKind};
use serde_json::Value;

/// Locate the JSON document inside a response.
///
/// Fenced blocks win when their body looks like JSON. Otherwise the first
/// balanced object or array is taken, whichever opens first.
///
/// # Examples
///
/// ```
/// use scriptorium_narrative::extract_json;
///
/// let response = "The outline follows.\n```json\n{\"title\": \"Tidewater\"}\n```\nEnjoy!";
/// assert_eq!(extract_json(response).unwrap(), "{\"title\": \"Tidewater\"}");
/// ```
pub fn extract_json(response: &str) -> Result<String, ShapeError> {
    if let Some(body) = fenced_block(response).filter(|body| looks_like_json(body)) {
        return Ok(body.to_string());
    }

    let object = response.find('{');
    let array = response.find('[');
    let order = match (object, array) {
        (Some(o), Some(a)) if a < o => [('[', ']'), ('{', '}')],
        _ => [('{', '}'), ('[', ']')],
    };
    for (open, close) in order {
        if let Some(found) = balanced(response, open, close) {
            return Ok(found.to_string());
        }
    }

    tracing::debug!(chars = response.len(), "No JSON document in response");
    Err(ShapeError::new(ShapeErrorKind::NoStructuredData(response.len())))
}

/// Extract and decode the JSON document inside a response.
pub fn decode_json(response: &str) -> Result<Value, ShapeError> {
    let json = extract_json(response)?;
    serde_json::from_str(&json).map_err(|e| {
        let err = JsonError::new(e.to_string()).with_preview(&json);
        tracing::debug!(error = %err, "Extracted JSON did not decode");
        ShapeError::new(ShapeErrorKind::Decode(e.to_string()))
    })
}

fn looks_like_json(body: &str) -> bool {
    matches!(body.trim_start().chars().next(), Some('{') | Some('['))
}

/// Body of the first fenced block, with any language tag dropped.
///
/// An unterminated fence runs to the end of the response, which is what a
/// truncated generation looks like.
fn fenced_block(response: &str) -> Option<&str> {
    let start = response.find("```")? + 3;
    let rest = &response[start..];
    let body_start = rest.find('\n').map(|n| n + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

/// First span from `open` to its matching `close`, ignoring delimiters
/// inside string literals.
fn balanced(response: &str, open: char, close: char) -> Option<&str> {
    let start = response.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in response[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&response[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
