//! Lenient extraction of a JSON object from raw LLM output.
//!
//! Models wrap JSON in prose, markdown fences, or leave trailing commas.
//! This module recovers the object when it can and reports a
//! [`LlmError::Parse`] when it cannot; the retry gate treats that as a
//! reason to ask again.

use serde_json::{Map, Value};

use crate::error::LlmError;

/// Extract a JSON object from an LLM response.
///
/// Attempts multiple recovery strategies if the raw text is not clean JSON:
/// 1. Direct `serde_json` deserialization
/// 2. Extract JSON from a markdown code block
/// 3. Strip trailing commas and retry
/// 4. Extract from a code block, then strip commas
/// 5. Slice from the first `{` to the last `}`, then strip commas
///
/// A top-level value that is not an object (array, string, number) is a
/// parse failure.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, LlmError> {
    let trimmed = raw.trim();

    let candidates = [
        Some(trimmed.to_owned()),
        extract_json_from_codeblock(trimmed).map(ToOwned::to_owned),
        Some(strip_trailing_commas(trimmed)),
        extract_json_from_codeblock(trimmed).map(strip_trailing_commas),
        outermost_braces(trimmed).map(strip_trailing_commas),
    ];

    for candidate in candidates.iter().flatten() {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
            return Ok(map);
        }
    }

    Err(LlmError::Parse(format!(
        "no JSON object found in response: {trimmed}"
    )))
}

/// Extract JSON content from a markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    // Look for ```json ... ``` or ``` ... ```
    let (fence, tag_len) = text
        .find("```json")
        .map(|i| (i, 7))
        .or_else(|| text.find("```").map(|i| (i, 3)))?;
    let after_tag = fence.checked_add(tag_len)?;
    let start = text
        .get(after_tag..)
        .and_then(|s| s.find('\n'))
        .and_then(|nl| after_tag.checked_add(nl))
        .and_then(|pos| pos.checked_add(1))
        .unwrap_or(after_tag);

    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// The text between the first `{` and the last `}`, inclusive.
fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Remove trailing commas before `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ',' {
            let rest: String = chars.clone().skip_while(|n| n.is_whitespace()).take(1).collect();
            if rest == "}" || rest == "]" {
                continue;
            }
        }
        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clean_object() {
        let map = extract_json_object(r#"{"action": "BUY", "reason": "cheap"}"#);
        let map = map.unwrap_or_default();
        assert_eq!(map.get("action").and_then(Value::as_str), Some("BUY"));
    }

    #[test]
    fn parse_from_codeblock() {
        let raw = "Here is my decision:\n```json\n{\"action\": \"SKIP\"}\n```\nThanks.";
        let map = extract_json_object(raw).unwrap_or_default();
        assert_eq!(map.get("action").and_then(Value::as_str), Some("SKIP"));
    }

    #[test]
    fn parse_trailing_comma() {
        let raw = r#"{"query": "exam prep course malaysia",}"#;
        let map = extract_json_object(raw).unwrap_or_default();
        assert!(map.contains_key("query"));
    }

    #[test]
    fn parse_object_embedded_in_prose() {
        let raw = r#"Sure! {"message": "I liked it, it was worth it",} Hope that helps."#;
        let map = extract_json_object(raw).unwrap_or_default();
        assert_eq!(
            map.get("message").and_then(Value::as_str),
            Some("I liked it, it was worth it")
        );
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(extract_json_object("[1, 2, 3]").is_err());
        assert!(extract_json_object("\"just a string\"").is_err());
        assert!(extract_json_object("").is_err());
        assert!(extract_json_object("I would rather not answer.").is_err());
    }

    #[test]
    fn extract_json_from_plain_codeblock() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_from_codeblock(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn strip_trailing_commas_basic() {
        assert_eq!(strip_trailing_commas(r#"{"a": 1, "b": 2,}"#), r#"{"a": 1, "b": 2}"#);
        assert_eq!(strip_trailing_commas("[1, 2, 3,\n]"), "[1, 2, 3\n]");
        assert_eq!(strip_trailing_commas(r#"{"a": "x,y"}"#), r#"{"a": "x,y"}"#);
    }
}
