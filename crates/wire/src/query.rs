// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The query surface consumed by the WebSocket layer (spec §6 "Query
//! surface").

use companion_core::{SessionStatus, TimelineEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Query {
    ListSessions,
    GetMessages {
        #[serde(default)]
        session_id: Option<String>,
    },
    GetStatus {
        #[serde(default)]
        session_id: Option<String>,
    },
    GetConversationChain {
        session_id: String,
    },
    GetServerSummary {
        #[serde(default)]
        tmux_filter: Option<Vec<String>>,
    },
    GetTmuxSessionForConversation {
        conversation_id: String,
    },
    GetActiveConversation,
    SetActiveSession {
        session_name: String,
    },
    ClearActiveSession,
    MarkSessionAsNew {
        session_name: String,
    },
    CheckAndEmitPendingApproval {
        #[serde(default)]
        session_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub session_name: Option<String>,
    pub project_path: Option<String>,
    pub status: SessionStatus,
    pub is_waiting_for_input: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentActivity {
    pub name: String,
    pub input_summary: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub is_running: bool,
    pub is_waiting_for_input: bool,
    pub last_activity_ms: i64,
    pub conversation_path: String,
    pub project_path: Option<String>,
    pub current_activity: Option<String>,
    pub recent_activity: Vec<RecentActivity>,
}

/// One session's sparkline material for `getServerSummary` (spec §6, "last
/// 30 minutes of message timestamps").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummaryEntry {
    pub session_id: String,
    pub session_name: Option<String>,
    pub status: SessionStatus,
    pub task_summary: Option<String>,
    pub recent_timestamps_ms: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueryResult {
    Sessions { sessions: Vec<SessionSummary> },
    Messages { messages: Vec<TimelineEntry> },
    Status { status: Option<StatusSummary> },
    ConversationChain { paths: Vec<String> },
    ServerSummary { sessions: Vec<ServerSummaryEntry> },
    TmuxSession { session_name: Option<String> },
    ActiveConversation { session_id: Option<String> },
    Ack,
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
