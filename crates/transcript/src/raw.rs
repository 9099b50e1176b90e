// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for picking values out of one decoded JSONL line.
//!
//! The wire format is heterogeneous enough (string-or-array content,
//! missing fields on older log versions) that we navigate `serde_json::Value`
//! directly rather than fighting a strict `#[derive(Deserialize)]` shape —
//! any field we can't find is simply absent, never a parse error.

use chrono::DateTime;
use serde_json::Value;

pub fn line_type(line: &Value) -> Option<&str> {
    line.get("type").and_then(Value::as_str)
}

/// Parse an ISO-8601 timestamp field to epoch milliseconds. Missing or
/// unparseable timestamps become `0` — ordering among entries on the same
/// line is never affected since callers use line order as the tiebreak.
pub fn timestamp_ms(line: &Value) -> i64 {
    line.get("timestamp")
        .and_then(Value::as_str)
        .or_else(|| line.get("isoTimestamp").and_then(Value::as_str))
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

/// One block inside a `message.content` array, or the single implied text
/// block when `content` is a bare string.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
    Other,
}

/// Flatten `message.content` into a list of blocks, accepting both the
/// bare-string shape and the structured-array shape.
pub fn content_blocks(message: &Value) -> Vec<ContentBlock> {
    match message.get("content") {
        Some(Value::String(text)) => vec![ContentBlock::Text(text.clone())],
        Some(Value::Array(items)) => items.iter().map(parse_block).collect(),
        _ => Vec::new(),
    }
}

fn parse_block(block: &Value) -> ContentBlock {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => {
            ContentBlock::Text(block.get("text").and_then(Value::as_str).unwrap_or_default().to_string())
        }
        Some("tool_use") => ContentBlock::ToolUse {
            id: block.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            name: block.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        },
        Some("tool_result") => {
            let content = tool_result_text(block.get("content").unwrap_or(&Value::Null));
            let is_error = block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
            ContentBlock::ToolResult {
                tool_use_id: block.get("tool_use_id").and_then(Value::as_str).unwrap_or_default().to_string(),
                content,
                is_error,
            }
        }
        _ => ContentBlock::Other,
    }
}

/// A tool-result's `content` field is either a bare string, or a list of
/// text blocks to join with newlines (spec §4.2 "Tool-use/result pairing").
fn tool_result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// The usage block on an assistant message, if present.
pub struct UsageBlock {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

pub fn usage_block(message: &Value) -> Option<UsageBlock> {
    let usage = message.get("usage")?;
    let field = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
    Some(UsageBlock {
        input_tokens: field("input_tokens"),
        output_tokens: field("output_tokens"),
        cache_creation_input_tokens: field("cache_creation_input_tokens"),
        cache_read_input_tokens: field("cache_read_input_tokens"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_accepts_bare_string() {
        let message = serde_json::json!({"content": "hello"});
        let blocks = content_blocks(&message);
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], ContentBlock::Text(t) if t == "hello"));
    }

    #[test]
    fn content_blocks_parses_tool_use_and_result() {
        let message = serde_json::json!({
            "content": [
                {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "ls"}},
            ]
        });
        let blocks = content_blocks(&message);
        assert!(matches!(&blocks[0], ContentBlock::ToolUse { id, name, .. } if id == "t1" && name == "Bash"));
    }

    #[test]
    fn tool_result_text_joins_text_blocks() {
        let content = serde_json::json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]);
        assert_eq!(tool_result_text(&content), "a\nb");
    }

    #[test]
    fn timestamp_ms_parses_rfc3339() {
        let line = serde_json::json!({"timestamp": "2026-01-30T08:17:05Z"});
        assert!(timestamp_ms(&line) > 0);
    }

    #[test]
    fn timestamp_ms_defaults_to_zero_when_missing() {
        let line = serde_json::json!({});
        assert_eq!(timestamp_ms(&line), 0);
    }
}
