// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure functions over a parsed [`Timeline`] (spec §4.3). None of these
//! touch the filesystem or tmux; each is a single pass over the entries
//! already in memory.

use crate::tool_config::{activity_label, is_approval_tool, param_summary};
use companion_core::{Timeline, TimelineEntry, ToolCall};
use serde::Serialize;
use std::collections::HashSet;

/// True iff the conversation has nothing left to do without user input
/// (spec §4.3 `waitingForInput`).
pub fn waiting_for_input(timeline: &Timeline) -> bool {
    let Some(last) = timeline.last() else { return false };
    let TimelineEntry::Assistant { tool_calls, is_waiting_for_choice, .. } = last else {
        return false;
    };
    if *is_waiting_for_choice {
        return true;
    }
    if tool_calls.is_empty() {
        return true;
    }
    tool_calls.iter().all(|t| t.status.is_terminal())
}

/// A human-readable one-liner describing what the assistant is doing right
/// now, or `None` when the last assistant entry has no tool calls (spec
/// §4.3 `currentActivity`).
pub fn current_activity(timeline: &Timeline) -> Option<String> {
    match timeline.last()? {
        TimelineEntry::User { .. } => Some("Processing…".to_string()),
        TimelineEntry::Assistant { tool_calls, .. } => {
            let tool = last_active_tool(tool_calls)?;
            let label = activity_label(&tool.name);
            match param_summary(&tool.name, &tool.input) {
                Some(summary) => Some(format!("{label}: {summary}")),
                None => Some(label.to_string()),
            }
        }
        _ => None,
    }
}

/// The last non-terminal tool call, or the last tool call overall if all
/// are terminal (so a just-finished turn still reports what it finished).
fn last_active_tool(tool_calls: &[ToolCall]) -> Option<&ToolCall> {
    tool_calls.iter().rev().find(|t| !t.status.is_terminal()).or_else(|| tool_calls.last())
}

/// `(name, id)` pairs for pending approval-gated tools on the last
/// assistant entry, excluding `Task` (spec §4.3 `pendingApprovalTools`).
pub fn pending_approval_tools(timeline: &Timeline) -> Vec<(String, String)> {
    let Some(TimelineEntry::Assistant { tool_calls, .. }) = timeline.last() else { return Vec::new() };
    tool_calls
        .iter()
        .filter(|t| t.is_pending() && is_approval_tool(&t.name) && t.name != "Task")
        .map(|t| (t.name.clone(), t.id.as_str().to_string()))
        .collect()
}

/// One summarized tool call, bounded for display (spec §4.3
/// `recentActivity`).
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub name: String,
    pub input_summary: Option<String>,
    pub output: Option<String>,
}

const MAX_OUTPUT_LEN: usize = 2000;

/// Chronological flatten of every tool call across the timeline, most
/// recent first, bounded to `limit` records.
pub fn recent_activity(timeline: &Timeline, limit: usize) -> Vec<ActivityRecord> {
    timeline
        .entries
        .iter()
        .flat_map(|e| e.tool_calls())
        .rev()
        .take(limit)
        .map(|t| ActivityRecord {
            name: t.name.clone(),
            input_summary: param_summary(&t.name, &t.input),
            output: t.output.as_ref().map(|o| truncate_output(o)),
        })
        .collect()
}

fn truncate_output(output: &str) -> String {
    if output.chars().count() <= MAX_OUTPUT_LEN {
        output.to_string()
    } else {
        output.chars().take(MAX_OUTPUT_LEN).collect()
    }
}

/// Token usage totals summed across assistant entries, deduplicated by
/// message id since the same id may repeat due to streaming (spec §4.3
/// `usage`). Entries with no `message_id` fall back to `(timestamp_ms,
/// content)` as a dedup key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_create_tokens: u64,
    pub cache_read_tokens: u64,
    pub message_count: usize,
    /// Usage of the most recent assistant message carrying a usage block —
    /// an approximation of the context window currently occupied.
    pub current_context_tokens: u64,
}

pub fn usage(timeline: &Timeline) -> UsageTotals {
    #[derive(Hash, PartialEq, Eq)]
    enum DedupKey {
        MessageId(String),
        Fallback(i64, String),
    }

    let mut seen = HashSet::new();
    let mut totals = UsageTotals::default();

    for entry in &timeline.entries {
        let TimelineEntry::Assistant { timestamp_ms, content, message_id, usage, .. } = entry else {
            continue;
        };
        let key = match message_id {
            Some(id) => DedupKey::MessageId(id.clone()),
            None => DedupKey::Fallback(*timestamp_ms, content.clone()),
        };
        if !seen.insert(key) {
            continue;
        }
        totals.message_count += 1;
        if let Some(u) = usage {
            totals.input_tokens += u.input_tokens;
            totals.output_tokens += u.output_tokens;
            totals.cache_create_tokens += u.cache_creation_input_tokens;
            totals.cache_read_tokens += u.cache_read_tokens;
            totals.current_context_tokens = u.input_tokens + u.cache_creation_input_tokens + u.cache_read_tokens;
        }
    }

    totals
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
