// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translates the engine's internal [`companion_core::Event`] (keyed by
//! `conversation_id`, carrying only what the registry computed) into the
//! client-facing [`WireEvent`] (keyed by `sessionId`, the tmux session
//! name, and carrying the `projectPath`/`path` context clients expect —
//! spec §6 "Outbound events").
//!
//! An event with no resolved owning session or no cached context is
//! dropped rather than sent half-populated (matches spec §4.6's "emit
//! events only when an owner exists").

use companion_core::Event;
use companion_wire::{PendingApprovalTool, WireEvent};

use crate::state::SharedState;

pub fn build_wire_event(event: &Event, state: &SharedState) -> Option<WireEvent> {
    let conversation_id = event.conversation_id();
    let registry = state.registry.lock();
    let entry = registry.entry(conversation_id)?;
    let session_name = entry.session_name.as_ref()?.to_string();

    let contexts = state.contexts.lock();
    let ctx = contexts.get(conversation_id)?;
    let path = ctx.path.display().to_string();
    let project_path = state.project_path_for(&ctx.encoded_dir).unwrap_or_else(|| path.clone());

    Some(match event {
        Event::ConversationUpdate { entries, .. } => WireEvent::ConversationUpdate {
            session_id: session_name,
            path,
            messages: entries.clone(),
            highlights: highlights(entries),
        },
        Event::StatusChange { .. } => WireEvent::StatusChange {
            session_id: session_name,
            is_waiting_for_input: entry.is_waiting_for_input(),
            current_activity: entry.current_activity.clone(),
            last_message: ctx.last_message.clone(),
        },
        Event::PendingApproval { tools, .. } => WireEvent::PendingApproval {
            session_id: session_name,
            project_path,
            tools: tools.iter().map(|t| PendingApprovalTool { name: t.name.clone(), id: t.id.as_str().to_string() }).collect(),
        },
        Event::Compaction { summary, .. } => WireEvent::Compaction {
            session_id: session_name.clone(),
            project_path,
            session_name,
            summary: summary.clone(),
            timestamp: entry.last_updated_ms,
        },
        Event::OtherSessionActivity { .. } => WireEvent::OtherSessionActivity {
            session_id: session_name.clone(),
            project_path,
            session_name,
            is_waiting_for_input: entry.is_waiting_for_input(),
            last_message: ctx.last_message.clone(),
            new_message_count: entry.message_count,
        },
        Event::ErrorDetected { message, .. } => WireEvent::ErrorDetected {
            session_id: session_name.clone(),
            project_path,
            session_name,
            content: message.clone(),
        },
        Event::SessionCompleted { .. } => WireEvent::SessionCompleted {
            session_id: session_name.clone(),
            project_path,
            session_name,
            content: ctx.last_message.clone().unwrap_or_default(),
        },
    })
}

/// One-liner highlights for `conversation-update`: the activity label for
/// every tool call introduced since the last parse, newest first. The
/// payload sketch in spec §6 names the field but doesn't define its
/// contents; this is the interpretation recorded in DESIGN.md.
fn highlights(entries: &[companion_core::TimelineEntry]) -> Vec<String> {
    entries.iter().rev().flat_map(|e| e.tool_calls()).map(|t| t.name.clone()).take(5).collect()
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
