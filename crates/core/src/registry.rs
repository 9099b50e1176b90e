// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory session registry: the live, queryable state of every tracked
//! conversation (spec §3 "Session registry entry", §4.6).

use crate::ids::{ConversationId, SessionName};
use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// The activity state of a tracked conversation, as surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No assistant activity and nothing pending; the default resting state.
    Idle,
    /// An assistant turn is in progress: a tool call is running, or the
    /// last entry is assistant output with no terminal tool result yet.
    Working,
    /// The assistant is blocked on an approval or interactive question.
    Waiting,
    /// The last tool call or parse attempt ended in error.
    Error,
}

crate::simple_display! {
    SessionStatus {
        Idle => "idle",
        Working => "working",
        Waiting => "waiting",
        Error => "error",
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Idle
    }
}

/// One line of free text describing what the assistant is currently doing,
/// derived from the last timeline entry (spec §4.3 `currentActivity`).
pub type CurrentActivity = Option<String>;

/// The full live state of one tracked conversation, as held in the
/// in-memory registry and serialized for the `GetStatus`/`ListSessions`
/// query responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRegistryEntry {
    pub conversation_id: ConversationId,
    pub session_name: Option<SessionName>,
    pub status: SessionStatus,
    pub current_activity: CurrentActivity,
    pub pending_approval_tools: Vec<ToolCall>,
    pub message_count: usize,
    pub last_updated_ms: i64,
    /// Set once the 3-second waiting-confirmation timer has elapsed
    /// (spec §4.6) — distinguishes a momentary status flicker from a
    /// confirmed, client-visible waiting state.
    pub waiting_confirmed: bool,
}

impl SessionRegistryEntry {
    pub fn new(conversation_id: ConversationId, now_ms: i64) -> Self {
        Self {
            conversation_id,
            session_name: None,
            status: SessionStatus::Idle,
            current_activity: None,
            pending_approval_tools: Vec::new(),
            message_count: 0,
            last_updated_ms: now_ms,
            waiting_confirmed: false,
        }
    }

    pub fn is_waiting_for_input(&self) -> bool {
        self.status == SessionStatus::Waiting && self.waiting_confirmed
    }
}
