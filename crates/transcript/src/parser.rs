// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turns one JSONL file's raw bytes into a [`Timeline`] (spec §4.2).

use crate::raw::{content_blocks, line_type, timestamp_ms, usage_block, ContentBlock};
use crate::tool_config::{is_approval_tool, is_interactive_tool, synthesizes_approval_options};
use companion_core::{
    ApprovalOption, CompactionEvent, QuestionEntry, Timeline, TimelineEntry, TokenUsage, ToolCall,
    ToolStatus,
};
use serde_json::Value;
use std::collections::HashMap;

/// Parse the full contents of a conversation's JSONL file into a timeline.
///
/// Malformed lines are skipped without aborting the parse (spec §7). Given
/// identical input bytes this function is deterministic modulo tool-call
/// ids, which are taken verbatim from the source JSON and so are already
/// stable within one parse.
pub fn parse_timeline(content: &str) -> Timeline {
    let mut entries: Vec<TimelineEntry> = Vec::new();
    // tool_use id -> (entry index, tool index within that entry's tool_calls)
    let mut pending_tools: HashMap<String, (usize, usize)> = HashMap::new();
    let mut pending_skill_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else { continue };
        match line_type(&value) {
            Some("user") => parse_user_line(&value, &mut entries, &mut pending_tools, &mut pending_skill_name),
            Some("assistant") => parse_assistant_line(&value, &mut entries, &mut pending_tools),
            Some("system") => parse_system_line(&value, &mut entries),
            Some("summary") => parse_summary_line(&value, &mut entries),
            Some("queue-operation") => parse_queue_operation_line(&value, &mut entries),
            _ => entries.push(TimelineEntry::Unknown { raw: value }),
        }
    }

    synthesize_last_assistant_approvals(&mut entries);
    Timeline { entries }
}

fn parse_user_line(
    value: &Value,
    entries: &mut Vec<TimelineEntry>,
    pending_tools: &mut HashMap<String, (usize, usize)>,
    pending_skill_name: &mut Option<String>,
) {
    let Some(message) = value.get("message") else {
        entries.push(TimelineEntry::Unknown { raw: value.clone() });
        return;
    };
    let timestamp_ms = timestamp_ms(value);
    let blocks = content_blocks(message);

    let mut text_parts = Vec::new();
    let mut resolved_skill_tool = None;
    for block in &blocks {
        match block {
            ContentBlock::Text(text) => text_parts.push(text.clone()),
            ContentBlock::ToolResult { tool_use_id, content, is_error } => {
                if let Some((entry_idx, tool_idx)) = pending_tools.remove(tool_use_id) {
                    if let Some(tool) = tool_call_mut(entries, entry_idx, tool_idx) {
                        tool.output = Some(content.clone());
                        tool.status = if *is_error { ToolStatus::Error } else { ToolStatus::Completed };
                        tool.completed_at_ms = Some(timestamp_ms);
                        if tool.name == "Skill" {
                            resolved_skill_tool = Some(tool.name.clone());
                        }
                    }
                }
            }
            ContentBlock::ToolUse { .. } | ContentBlock::Other => {}
        }
    }

    if !text_parts.is_empty() {
        let skill_name = pending_skill_name.take();
        entries.push(TimelineEntry::User { content: text_parts.join("\n"), timestamp_ms, skill_name });
    }

    if resolved_skill_tool.is_some() {
        *pending_skill_name = resolved_skill_tool;
    }
}

fn parse_assistant_line(value: &Value, entries: &mut Vec<TimelineEntry>, pending_tools: &mut HashMap<String, (usize, usize)>) {
    let Some(message) = value.get("message") else {
        entries.push(TimelineEntry::Unknown { raw: value.clone() });
        return;
    };
    let timestamp_ms = timestamp_ms(value);
    let blocks = content_blocks(message);

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in &blocks {
        match block {
            ContentBlock::Text(text) => text_parts.push(text.clone()),
            ContentBlock::ToolUse { id, name, input } => {
                let mut call = ToolCall::new(id.clone(), name.clone(), input.clone());
                call.started_at_ms = Some(timestamp_ms);
                // Only approval-gated and interactive tools wait on a
                // choice; everything else (Read, Grep, WebFetch, ...) is
                // already executing with no gate to sit behind.
                if !is_approval_tool(name) && !is_interactive_tool(name) {
                    call.status = ToolStatus::Running;
                }
                tool_calls.push(call);
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Other => {}
        }
    }

    let entry_idx = entries.len();
    for (tool_idx, call) in tool_calls.iter().enumerate() {
        pending_tools.insert(call.id.as_str().to_string(), (entry_idx, tool_idx));
    }

    let message_id = message.get("id").and_then(Value::as_str).map(|s| s.to_string());
    let usage = usage_block(message).map(|u| TokenUsage {
        input_tokens: u.input_tokens,
        output_tokens: u.output_tokens,
        cache_creation_input_tokens: u.cache_creation_input_tokens,
        cache_read_input_tokens: u.cache_read_input_tokens,
    });

    entries.push(TimelineEntry::Assistant {
        content: text_parts.join("\n"),
        tool_calls,
        timestamp_ms,
        is_waiting_for_choice: false,
        questions: Vec::new(),
        message_id,
        usage,
    });
}

fn parse_system_line(value: &Value, entries: &mut Vec<TimelineEntry>) {
    let content = value.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    let is_compaction = value.get("subtype").and_then(Value::as_str) == Some("compact_boundary");
    entries.push(TimelineEntry::System { content, is_compaction, timestamp_ms: timestamp_ms(value) });
}

fn parse_summary_line(value: &Value, entries: &mut Vec<TimelineEntry>) {
    let content = value
        .get("summary")
        .or_else(|| value.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    entries.push(TimelineEntry::System { content, is_compaction: true, timestamp_ms: timestamp_ms(value) });
}

/// Extracts the `<summary>...</summary>` fragment from an embedded
/// task-notification XML payload (spec §4.2 "Queue-operation").
fn extract_summary_tag(xml: &str) -> Option<String> {
    let start = xml.find("<summary>")? + "<summary>".len();
    let end = xml[start..].find("</summary>")? + start;
    Some(xml[start..end].trim().to_string())
}

fn parse_queue_operation_line(value: &Value, entries: &mut Vec<TimelineEntry>) {
    let raw_content = value.get("content").and_then(Value::as_str).unwrap_or_default();
    let summary = extract_summary_tag(raw_content).unwrap_or_else(|| raw_content.to_string());
    let status = ToolStatus::Completed;
    let tool_call = ToolCall {
        id: "queue-operation".into(),
        name: "TaskOutput".to_string(),
        input: Value::Null,
        status,
        output: None,
        started_at_ms: None,
        completed_at_ms: None,
        approval_options: None,
    };
    entries.push(TimelineEntry::QueueOperation {
        content: summary,
        tool_calls: vec![tool_call],
        timestamp_ms: timestamp_ms(value),
    });
}

fn tool_call_mut(entries: &mut [TimelineEntry], entry_idx: usize, tool_idx: usize) -> Option<&mut ToolCall> {
    match entries.get_mut(entry_idx) {
        Some(TimelineEntry::Assistant { tool_calls, .. }) => tool_calls.get_mut(tool_idx),
        _ => None,
    }
}

/// Applies approval synthesis to the last assistant entry only (spec §4.2
/// "Approval synthesis"): attaches the standard trio to pending
/// approval-gated tools, and extracts options directly for interactive
/// tools (`AskUserQuestion`, `ExitPlanMode`).
fn synthesize_last_assistant_approvals(entries: &mut [TimelineEntry]) {
    let Some(idx) = entries.iter().rposition(|e| e.is_assistant()) else { return };
    let TimelineEntry::Assistant { tool_calls, is_waiting_for_choice, questions, .. } = &mut entries[idx] else {
        return;
    };

    for call in tool_calls.iter_mut().filter(|c| c.is_pending()) {
        if synthesizes_approval_options(&call.name) {
            call.approval_options = Some(ApprovalOption::standard_trio());
            *is_waiting_for_choice = true;
        } else if call.name == "AskUserQuestion" || call.name == "ExitPlanMode" {
            let extracted = extract_questions(&call.input);
            if !extracted.is_empty() {
                *questions = extracted;
                *is_waiting_for_choice = true;
            } else {
                *is_waiting_for_choice = true;
            }
        }
    }
}

/// Pull question/option pairs out of an `AskUserQuestion`/`ExitPlanMode`
/// tool input. The first question is the primary (spec §4.2), but all are
/// preserved in order.
fn extract_questions(input: &Value) -> Vec<QuestionEntry> {
    let raw_questions = input
        .get("questions")
        .and_then(Value::as_array)
        .cloned()
        .or_else(|| input.get("question").map(|q| vec![q.clone()]))
        .unwrap_or_default();

    raw_questions
        .iter()
        .filter_map(|q| {
            let question = q.get("question").and_then(Value::as_str)?.to_string();
            let options = q
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| {
                    opts.iter()
                        .filter_map(|o| {
                            let label = o.as_str().map(|s| s.to_string()).or_else(|| {
                                o.get("label").and_then(Value::as_str).map(|s| s.to_string())
                            })?;
                            let value = o
                                .get("value")
                                .and_then(Value::as_str)
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| label.clone());
                            Some(ApprovalOption { label, value })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(QuestionEntry { question, options })
        })
        .collect()
}

/// Scan for a live compaction event starting after `last_checked_line`
/// (0-indexed), returning it together with the new high-water line count
/// (spec §4.2 "Compaction").
pub fn detect_compaction(content: &str, last_checked_line: usize) -> (Option<CompactionEvent>, usize) {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    if last_checked_line >= total {
        return (None, total);
    }

    for i in last_checked_line..total {
        let Ok(value) = serde_json::from_str::<Value>(lines[i]) else { continue };
        match line_type(&value) {
            Some("summary") => {
                let summary = value
                    .get("summary")
                    .or_else(|| value.get("content"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return (Some(CompactionEvent { summary, timestamp_ms: timestamp_ms(&value) }), total);
            }
            Some("system") if value.get("subtype").and_then(Value::as_str) == Some("compact_boundary") => {
                if let Some(next_line) = lines.get(i + 1) {
                    if let Ok(next_value) = serde_json::from_str::<Value>(next_line) {
                        if line_type(&next_value) == Some("user") {
                            let summary = user_text(&next_value);
                            return (
                                Some(CompactionEvent { summary, timestamp_ms: timestamp_ms(&next_value) }),
                                total,
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }

    (None, total)
}

fn user_text(value: &Value) -> String {
    let Some(message) = value.get("message") else { return String::new() };
    content_blocks(message)
        .into_iter()
        .filter_map(|b| match b {
            ContentBlock::Text(t) => Some(t),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
