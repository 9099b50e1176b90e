// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound event payloads pushed to WebSocket clients (spec §6).

use crate::ids::{ConversationId, SessionName};
use crate::registry::SessionStatus;
use crate::timeline::TimelineEntry;
use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// One event broadcast to connected clients. Tagged by `event` so the
/// wire crate can route each variant to its JSON frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    ConversationUpdate {
        conversation_id: ConversationId,
        entries: Vec<TimelineEntry>,
    },
    StatusChange {
        conversation_id: ConversationId,
        status: SessionStatus,
        previous_status: SessionStatus,
    },
    PendingApproval {
        conversation_id: ConversationId,
        tools: Vec<ToolCall>,
    },
    Compaction {
        conversation_id: ConversationId,
        summary: String,
    },
    /// Activity observed on a conversation other than the client's current
    /// subscription target (spec §6) — lets the UI surface a badge without
    /// a full resubscribe.
    OtherSessionActivity {
        conversation_id: ConversationId,
        session_name: Option<SessionName>,
    },
    ErrorDetected {
        conversation_id: ConversationId,
        message: String,
    },
    SessionCompleted {
        conversation_id: ConversationId,
    },
}

impl Event {
    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            Event::ConversationUpdate { conversation_id, .. }
            | Event::StatusChange { conversation_id, .. }
            | Event::PendingApproval { conversation_id, .. }
            | Event::Compaction { conversation_id, .. }
            | Event::OtherSessionActivity { conversation_id, .. }
            | Event::ErrorDetected { conversation_id, .. }
            | Event::SessionCompleted { conversation_id } => conversation_id,
        }
    }
}
