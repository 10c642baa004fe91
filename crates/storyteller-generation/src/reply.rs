//! Parsing of list replies.
//!
//! The service is asked for a JSON array of strings but often wraps it in
//! prose. Only the span from the first `[` to its matching `]` is parsed.

use storyteller_core::error::GenerationError;

/// Locates the first `[` and its matching `]`, skipping brackets inside
/// JSON string literals.
#[must_use]
pub fn find_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the embedded JSON array of strings in `raw`.
///
/// # Errors
///
/// Returns `GenerationError::MalformedResponse` if no balanced array is
/// present or the span is not an array of strings.
pub fn parse_string_array(raw: &str) -> Result<Vec<String>, GenerationError> {
    let span = find_json_array(raw).ok_or_else(|| {
        GenerationError::MalformedResponse("reply contains no JSON array".into())
    })?;
    serde_json::from_str(span)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid JSON array: {e}")))
}
