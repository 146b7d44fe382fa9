//! CLI agent output parsing
//!
//! Agent CLIs emit ANSI color even in their JSON modes, interleave
//! system/thinking/assistant/result records when streaming, and have been
//! observed truncating large payloads mid-string. This module turns that
//! noise into the one result-bearing JSON record per invocation, falling back
//! to regex salvage only when strict parsing has already failed.
//!
//! The single-line brace scan is an explicit character state machine: it
//! tracks string literals and escapes so braces inside string values never
//! count as structure.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from output parsing
#[derive(Debug, Error)]
pub enum ParseError {
    /// No structurally valid JSON object found in the output
    #[error("no valid JSON object in agent output: {0}")]
    InvalidJson(String),

    /// The selected record was a protocol-level system message
    #[error("received system message instead of result message (subtype: {subtype})")]
    SystemRecord { subtype: String },
}

// CSI sequences plus two-byte escapes (cursor moves, charset selects).
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("valid regex"));

/// Strip ANSI escape sequences from raw CLI output.
pub fn strip_ansi(raw: &str) -> String {
    ANSI_ESCAPE.replace_all(raw, "").into_owned()
}

/// Extract the result-bearing JSON record from raw agent stdout.
///
/// Multi-line output is treated as newline-delimited JSON: the last record
/// with `type` of `result` or `assistant` wins, falling back to the last
/// structurally valid line. Single-line output goes through the brace-walk
/// extractor. A `type: "system"` record in the final position is a protocol
/// violation and is rejected.
pub fn parse(raw: &str) -> Result<Value, ParseError> {
    let cleaned = strip_ansi(raw);
    let trimmed = cleaned.trim();

    let lines: Vec<&str> = trimmed.lines().collect();
    let candidate = if lines.len() > 1 {
        select_ndjson_record(&lines).map(|line| line.to_string())
    } else {
        None
    };

    let json_str = match candidate {
        Some(line) => line,
        None => extract_last_object(trimmed).unwrap_or_else(|| trimmed.to_string()),
    };

    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    if value.get("type").and_then(Value::as_str) == Some("system") {
        let subtype = value
            .get("subtype")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        warn!(subtype = %subtype, "stream filtering left a system record");
        return Err(ParseError::SystemRecord { subtype });
    }

    Ok(value)
}

/// Pick the result-bearing line from newline-delimited JSON output.
///
/// Priority: the last `type == "result"` record, then the last
/// `type == "assistant"` record, then the last line that parses at all.
fn select_ndjson_record<'a>(lines: &[&'a str]) -> Option<&'a str> {
    let mut last_result: Option<&str> = None;
    let mut last_assistant: Option<&str> = None;
    let mut last_valid: Option<&str> = None;

    for line in lines {
        let line = line.trim();
        if !(line.starts_with('{') && line.ends_with('}')) {
            continue;
        }
        let Ok(obj) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        last_valid = Some(line);
        match obj.get("type").and_then(Value::as_str) {
            Some("result") => last_result = Some(line),
            Some("assistant") => last_assistant = Some(line),
            _ => {}
        }
    }

    if last_result.is_none() && last_valid.is_some() {
        debug!("no result-type record in stream output, falling back");
    }
    last_result.or(last_assistant).or(last_valid)
}

/// Extract the last top-level `{...}` object from a cleaned buffer.
///
/// Walks the text character by character, tracking whether the cursor is
/// inside a string literal (honoring backslash escapes) so that only
/// structural braces affect depth.
fn extract_last_object(cleaned: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in cleaned.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(s) = start.take() {
                        candidates.push((s, i + 1));
                    }
                }
            }
            _ => {}
        }
    }

    candidates
        .last()
        .map(|&(s, e)| cleaned[s..e].to_string())
}

/// Extract the text payload from a parsed agent record.
///
/// Tries keys in a fixed priority order. Content-block lists contribute only
/// their `text` blocks; a list with no text blocks (a tool-only turn) yields
/// the empty string rather than a serialized structure.
pub fn extract_content(data: &Value) -> String {
    if let Some(result) = data.get("result") {
        if let Some(s) = result.as_str() {
            return s.to_string();
        }
        if let Some(content) = result.get("content") {
            return extract_string_content(content);
        }
    }

    if data.get("type").and_then(Value::as_str) == Some("assistant") {
        if let Some(content) = data.get("message").and_then(|m| m.get("content")) {
            return extract_string_content(content);
        }
    }

    if let Some(content) = data.get("content") {
        return extract_string_content(content);
    }

    if let Some(message) = data.get("message").and_then(Value::as_str) {
        return message.to_string();
    }

    if let Some(content) = data.get("response").and_then(|r| r.get("content")) {
        return extract_string_content(content);
    }

    if let Some(text) = data.get("text").and_then(Value::as_str) {
        return text.to_string();
    }

    if let Some(output) = data.get("output").and_then(Value::as_str) {
        return output.to_string();
    }

    // Gemini candidate arrays: candidates[0].content.parts[0].text
    if let Some(text) = data
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
    {
        return text.to_string();
    }

    warn!("unexpected JSON structure, returning formatted record");
    serde_json::to_string_pretty(data).unwrap_or_default()
}

/// Like [`extract_content`], but tries an adapter-supplied key first.
///
/// Hints come from tool adapters (e.g. Gemini's top-level `response`);
/// anything the hint does not cover falls through to the generic order.
pub fn extract_content_with_hint(data: &Value, hint: Option<&str>) -> String {
    if let Some(key) = hint {
        if let Some(s) = data.get(key).and_then(Value::as_str) {
            return s.to_string();
        }
    }
    extract_content(data)
}

/// Flatten a content value that may be a string, block list, or object.
fn extract_string_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => {
            let mut parts: Vec<String> = Vec::new();
            for block in blocks {
                match block {
                    Value::Object(map) => {
                        let block_type = map.get("type").and_then(Value::as_str).unwrap_or("");
                        match block_type {
                            // tool_use / tool_result blocks are not the response
                            "tool_use" | "tool_result" => continue,
                            _ => {
                                if let Some(text) = map.get("text").and_then(Value::as_str) {
                                    parts.push(text.to_string());
                                } else if let Some(inner) = map.get("content") {
                                    parts.push(extract_string_content(inner));
                                }
                            }
                        }
                    }
                    Value::String(s) => parts.push(s.clone()),
                    _ => {}
                }
            }
            if parts.is_empty() {
                // Tool-only intermediate turn: empty message, not a structure dump.
                debug!("content list has no text blocks, treating as intermediate turn");
                String::new()
            } else {
                parts.join("\n")
            }
        }
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                text.to_string()
            } else if let Some(value) = map.get("value") {
                value.as_str().map(String::from).unwrap_or_else(|| value.to_string())
            } else {
                content.to_string()
            }
        }
        other => other.to_string(),
    }
}

static SALVAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["result", "content", "message"]
        .iter()
        .map(|field| {
            // Captures escaped-quote-aware values, continuing to end of
            // input when the closing quote was truncated away.
            Regex::new(&format!(
                r#"(?s)"{field}"\s*:\s*"((?:[^"\\]|\\.)*?)(?:"[\s,}}]|$)"#
            ))
            .expect("valid regex")
        })
        .collect()
});

/// Regex recovery for truncated JSON. Only called after strict parsing fails.
///
/// Matches the value of `result`, `content`, or `message` (in that order) and
/// decodes the standard JSON escapes.
pub fn salvage(malformed: &str) -> Option<String> {
    for pattern in SALVAGE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(malformed) {
            let raw = captures.get(1)?.as_str();
            return Some(decode_escapes(raw));
        }
    }
    None
}

fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse stdout and extract the text payload in one step, salvaging
/// truncated output when strict parsing fails.
pub fn parse_and_extract(raw: &str) -> Result<String, ParseError> {
    parse_and_extract_hinted(raw, None)
}

/// [`parse_and_extract`] with an adapter content hint.
pub fn parse_and_extract_hinted(raw: &str, hint: Option<&str>) -> Result<String, ParseError> {
    match parse(raw) {
        Ok(value) => Ok(extract_content_with_hint(&value, hint)),
        Err(err @ ParseError::SystemRecord { .. }) => Err(err),
        Err(err) => {
            warn!("strict parse failed, attempting regex salvage");
            let cleaned = strip_ansi(raw);
            salvage(&cleaned).ok_or(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_ansi_color_codes() {
        let raw = "\x1b[32m{\"type\":\"result\"}\x1b[0m";
        assert_eq!(strip_ansi(raw), "{\"type\":\"result\"}");
    }

    #[test]
    fn test_parse_single_json_object() {
        let value = parse(r#"{"type":"result","result":"hello"}"#).unwrap();
        assert_eq!(value["result"], "hello");
    }

    #[test]
    fn test_parse_ndjson_prefers_last_result_record() {
        let raw = concat!(
            "{\"type\":\"system\",\"subtype\":\"init\"}\n",
            "{\"type\":\"result\",\"result\":\"first\"}\n",
            "{\"type\":\"assistant\",\"message\":{\"content\":\"mid\"}}\n",
            "{\"type\":\"result\",\"result\":\"last\"}",
        );
        let value = parse(raw).unwrap();
        assert_eq!(value["result"], "last");
    }

    #[test]
    fn test_parse_ndjson_falls_back_to_assistant() {
        let raw = concat!(
            "{\"type\":\"system\",\"subtype\":\"init\"}\n",
            "{\"type\":\"assistant\",\"message\":{\"content\":\"from assistant\"}}",
        );
        let value = parse(raw).unwrap();
        assert_eq!(value["type"], "assistant");
    }

    #[test]
    fn test_parse_ansi_laced_stream_output() {
        // Literal end-to-end scenario: ANSI + NDJSON with tool-only turn.
        let raw = "\x1b[32m{\"type\":\"system\",\"subtype\":\"init\"}\n{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"tool_use\"}]}}\n{\"type\":\"result\",\"result\":\"hello\"}\x1b[0m";
        assert_eq!(parse_and_extract(raw).unwrap(), "hello");
    }

    #[test]
    fn test_parse_rejects_lone_system_record() {
        let raw = r#"{"type":"system","subtype":"init"}"#;
        let err = parse(raw).unwrap_err();
        assert!(matches!(err, ParseError::SystemRecord { .. }));
        assert!(parse_and_extract(raw).is_err());
    }

    #[test]
    fn test_parse_extracts_object_from_surrounding_noise() {
        let raw = r#"Loading model... {"type":"result","result":"ok"} done."#;
        let value = parse(raw).unwrap();
        assert_eq!(value["result"], "ok");
    }

    #[test]
    fn test_braces_inside_strings_do_not_count() {
        let raw = r#"{"result":"code: fn main() { println!(\"{}\", 1); }"}"#;
        let value = parse(raw).unwrap();
        assert!(value["result"].as_str().unwrap().contains("println!"));
    }

    #[test]
    fn test_takes_last_of_multiple_objects_on_one_line() {
        let raw = r#"{"progress":1} {"type":"result","result":"final"}"#;
        let value = parse(raw).unwrap();
        assert_eq!(value["result"], "final");
    }

    #[test]
    fn test_parser_is_deterministic() {
        let raw = "{\"type\":\"result\",\"result\":\"same\"}\n{\"other\":true}";
        let a = parse(raw).unwrap();
        let b = parse(raw).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_content_result_string() {
        assert_eq!(
            extract_content(&json!({"type":"result","result":"plan text"})),
            "plan text"
        );
    }

    #[test]
    fn test_extract_content_assistant_blocks() {
        let data = json!({
            "type": "assistant",
            "message": {"content": [
                {"type": "text", "text": "part one"},
                {"type": "tool_use", "id": "t1"},
                {"type": "text", "text": "part two"},
            ]}
        });
        assert_eq!(extract_content(&data), "part one\npart two");
    }

    #[test]
    fn test_extract_content_tool_only_turn_is_empty() {
        let data = json!({
            "type": "assistant",
            "message": {"content": [{"type": "tool_use", "id": "t1"}]}
        });
        assert_eq!(extract_content(&data), "");
    }

    #[test]
    fn test_extract_content_key_priority() {
        assert_eq!(extract_content(&json!({"content": "direct"})), "direct");
        assert_eq!(extract_content(&json!({"message": "msg"})), "msg");
        assert_eq!(
            extract_content(&json!({"response": {"content": "nested"}})),
            "nested"
        );
        assert_eq!(extract_content(&json!({"text": "plain"})), "plain");
        assert_eq!(extract_content(&json!({"output": "out"})), "out");
    }

    #[test]
    fn test_extract_content_gemini_candidates() {
        let data = json!({
            "candidates": [{"content": {"parts": [{"text": "gemini says"}]}}]
        });
        assert_eq!(extract_content(&data), "gemini says");
    }

    #[test]
    fn test_salvage_truncated_result() {
        // Literal end-to-end scenario: unterminated string value.
        let raw = r#"{"type":"result","result":"Line1\nLine2"#;
        assert!(parse(raw).is_err());
        assert_eq!(salvage(raw).unwrap(), "Line1\nLine2");
        assert_eq!(parse_and_extract(raw).unwrap(), "Line1\nLine2");
    }

    #[test]
    fn test_salvage_decodes_escapes() {
        let raw = r#"{"content":"a\tb\r\n\"quoted\" \\slash"#;
        assert_eq!(salvage(raw).unwrap(), "a\tb\r\n\"quoted\" \\slash");
    }

    #[test]
    fn test_salvage_field_priority() {
        let raw = r#"{"message":"from message","result":"from result"#;
        assert_eq!(salvage(raw).unwrap(), "from result");
    }

    #[test]
    fn test_salvage_complete_value_stops_at_close_quote() {
        let raw = r#"{"result":"done","elapsed_ms":12"#;
        assert_eq!(salvage(raw).unwrap(), "done");
    }

    #[test]
    fn test_salvage_nothing_to_recover() {
        assert!(salvage("complete garbage").is_none());
    }

    #[test]
    fn test_extract_with_hint() {
        let data = json!({"response": "gemini text", "result": "other"});
        assert_eq!(
            extract_content_with_hint(&data, Some("response")),
            "gemini text"
        );
        // hint misses -> generic order applies
        assert_eq!(
            extract_content_with_hint(&json!({"result": "r"}), Some("response")),
            "r"
        );
    }

    #[test]
    fn test_round_trip_canonical_object() {
        let obj = json!({"type": "result", "result": "round trip", "n": 3});
        let assembled = serde_json::to_string(&obj).unwrap();
        assert_eq!(parse(&assembled).unwrap(), obj);
    }
}
