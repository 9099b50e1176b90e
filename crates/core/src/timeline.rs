// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reconstructed message timeline for a single conversation.

use crate::tool::{QuestionEntry, ToolCall};
use serde::{Deserialize, Serialize};

/// One entry in a conversation's reconstructed timeline.
///
/// `Unknown` preserves unrecognized `type` discriminators so round-tripping
/// stays lossless and parser correctness stays localizable (spec §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TimelineEntry {
    User {
        content: String,
        timestamp_ms: i64,
        /// Set when this message is the auto-expanded prompt of a `Skill`
        /// tool-use, so the UI can suppress it as noise (spec §4.2).
        #[serde(default)]
        skill_name: Option<String>,
    },
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
        timestamp_ms: i64,
        #[serde(default)]
        is_waiting_for_choice: bool,
        #[serde(default)]
        questions: Vec<QuestionEntry>,
        /// The source message id, when present. Streamed messages can
        /// repeat the same id across multiple lines; used to dedup usage
        /// totals (spec §4.3 `usage`).
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        usage: Option<TokenUsage>,
    },
    System {
        content: String,
        is_compaction: bool,
        timestamp_ms: i64,
    },
    /// Synthesized from an embedded task-notification XML fragment in a
    /// `queue-operation` entry (spec §4.2).
    QueueOperation {
        content: String,
        tool_calls: Vec<ToolCall>,
        timestamp_ms: i64,
    },
    Unknown {
        raw: serde_json::Value,
    },
}

impl TimelineEntry {
    pub fn timestamp_ms(&self) -> Option<i64> {
        match self {
            TimelineEntry::User { timestamp_ms, .. }
            | TimelineEntry::Assistant { timestamp_ms, .. }
            | TimelineEntry::System { timestamp_ms, .. }
            | TimelineEntry::QueueOperation { timestamp_ms, .. } => Some(*timestamp_ms),
            TimelineEntry::Unknown { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            TimelineEntry::Assistant { tool_calls, .. }
            | TimelineEntry::QueueOperation { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, TimelineEntry::Assistant { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, TimelineEntry::User { .. })
    }
}

/// A fully reconstructed conversation timeline: an ordered sequence of
/// entries produced by parsing one JSONL file's bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TimelineEntry> {
        self.entries.last()
    }

    /// Index of the last assistant entry, if any.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.entries.iter().rposition(|e| e.is_assistant())
    }

    pub fn message_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e, TimelineEntry::Unknown { .. }))
            .count()
    }
}

/// A live compaction event detected while parsing (spec §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionEvent {
    pub summary: String,
    pub timestamp_ms: i64,
}

/// Token usage reported on one assistant message (spec §6 "Usage blocks").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}
