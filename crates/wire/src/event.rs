// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire-level shape of outbound events (spec §6 "Outbound events").
//!
//! [`companion_core::Event`] is the engine's internal pub/sub payload, keyed
//! by `conversation_id` and carrying only what the registry computed. This
//! [`WireEvent`] is what actually goes out over the WebSocket: every
//! variant carries a `session_id` (the tmux session, when one is mapped)
//! alongside the `projectPath`/`sessionName` fields spec.md §6 sketches.
//! The engine builds one from the other once it resolves a conversation's
//! current mapping.

use companion_core::TimelineEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingApprovalTool {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum WireEvent {
    ConversationUpdate {
        session_id: String,
        path: String,
        messages: Vec<TimelineEntry>,
        highlights: Vec<String>,
    },
    StatusChange {
        session_id: String,
        is_waiting_for_input: bool,
        current_activity: Option<String>,
        last_message: Option<String>,
    },
    PendingApproval {
        session_id: String,
        project_path: String,
        tools: Vec<PendingApprovalTool>,
    },
    Compaction {
        session_id: String,
        project_path: String,
        session_name: String,
        summary: String,
        timestamp: i64,
    },
    OtherSessionActivity {
        session_id: String,
        project_path: String,
        session_name: String,
        is_waiting_for_input: bool,
        last_message: Option<String>,
        new_message_count: usize,
    },
    ErrorDetected {
        session_id: String,
        project_path: String,
        session_name: String,
        content: String,
    },
    SessionCompleted {
        session_id: String,
        project_path: String,
        session_name: String,
        content: String,
    },
}

impl WireEvent {
    pub fn session_id(&self) -> &str {
        match self {
            WireEvent::ConversationUpdate { session_id, .. }
            | WireEvent::StatusChange { session_id, .. }
            | WireEvent::PendingApproval { session_id, .. }
            | WireEvent::Compaction { session_id, .. }
            | WireEvent::OtherSessionActivity { session_id, .. }
            | WireEvent::ErrorDetected { session_id, .. }
            | WireEvent::SessionCompleted { session_id, .. } => session_id,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
