// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handles the read/write query surface the listener dispatches client
//! requests to (spec §6 "Query surface").

use companion_core::{ConversationId, SessionName};
use companion_engine::ResolverState;
use companion_transcript::detect;
use companion_wire::{
    Query, QueryResult, RecentActivity, ServerSummaryEntry, SessionSummary, StatusSummary,
};

use crate::state::SharedState;

const CONVERSATION_CHAIN_LIMIT: usize = 20;
const RECENT_ACTIVITY_LIMIT: usize = 20;
const SERVER_SUMMARY_WINDOW_MS: i64 = 30 * 60 * 1000;

pub fn handle_query(state: &SharedState, query: Query, now_ms: i64) -> QueryResult {
    match query {
        Query::ListSessions => list_sessions(state),
        Query::GetMessages { session_id } => get_messages(state, session_id),
        Query::GetStatus { session_id } => get_status(state, session_id),
        Query::GetConversationChain { session_id } => get_conversation_chain(state, &session_id),
        Query::GetServerSummary { tmux_filter } => get_server_summary(state, tmux_filter, now_ms),
        Query::GetTmuxSessionForConversation { conversation_id } => get_tmux_session_for_conversation(state, &conversation_id),
        Query::GetActiveConversation => get_active_conversation(state),
        Query::SetActiveSession { session_name } => set_active_session(state, &session_name),
        Query::ClearActiveSession => clear_active_session(state),
        Query::MarkSessionAsNew { session_name } => mark_session_as_new(state, session_name, now_ms),
        Query::CheckAndEmitPendingApproval { session_id } => check_and_emit_pending_approval(state, session_id),
    }
}

fn resolve_session(state: &SharedState, session_id: Option<String>) -> Option<ConversationId> {
    let registry = state.registry.lock();
    match session_id {
        Some(name) => registry.conversation_for_session(&SessionName::new(name)).cloned(),
        None => registry.active_conversation().cloned(),
    }
}

fn list_sessions(state: &SharedState) -> QueryResult {
    let registry = state.registry.lock();
    let contexts = state.contexts.lock();
    let sessions = registry
        .entries()
        .filter(|e| e.session_name.is_some())
        .map(|e| SessionSummary {
            session_id: e.session_name.as_ref().map(|n| n.to_string()).unwrap_or_default(),
            session_name: e.session_name.as_ref().map(|n| n.to_string()),
            project_path: contexts.get(&e.conversation_id).and_then(|c| state.project_path_for(&c.encoded_dir)),
            status: e.status,
            is_waiting_for_input: e.is_waiting_for_input(),
        })
        .collect();
    QueryResult::Sessions { sessions }
}

fn get_messages(state: &SharedState, session_id: Option<String>) -> QueryResult {
    let Some(conversation_id) = resolve_session(state, session_id) else {
        return QueryResult::Messages { messages: Vec::new() };
    };

    // The cached registry timeline is only as fresh as the last debounced
    // tail pass; if the file on disk has moved on since then, re-parse it
    // directly rather than serving a stale snapshot (spec §6).
    let cached_context = {
        let contexts = state.contexts.lock();
        contexts.get(&conversation_id).map(|c| (c.path.clone(), c.source_mtime_ms))
    };
    if let Some((path, cached_mtime_ms)) = cached_context {
        let on_disk_mtime_ms = std::fs::metadata(&path).and_then(|m| m.modified()).ok().map(epoch_ms);
        if on_disk_mtime_ms.is_some_and(|mtime| mtime > cached_mtime_ms) {
            if let Ok(content) = std::fs::read_to_string(&path) {
                let timeline = companion_transcript::parse_timeline(&content);
                return QueryResult::Messages { messages: timeline.entries };
            }
        }
    }

    let registry = state.registry.lock();
    let messages = registry.timeline(&conversation_id).map(|t| t.entries.clone()).unwrap_or_default();
    QueryResult::Messages { messages }
}

fn epoch_ms(time: std::time::SystemTime) -> i64 {
    time.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Re-reads the resolved conversation's pending-approval tools from the
/// registry and rebroadcasts them, letting a reconnecting client resync a
/// prompt it may have missed while disconnected (spec §6).
fn check_and_emit_pending_approval(state: &SharedState, session_id: Option<String>) -> QueryResult {
    if let Some(conversation_id) = resolve_session(state, session_id) {
        let pending_approval = {
            let registry = state.registry.lock();
            registry.entry(&conversation_id).filter(|e| !e.pending_approval_tools.is_empty()).map(|e| e.pending_approval_tools.clone())
        };
        if let Some(tools) = pending_approval {
            state.event_bus.lock().broadcast(companion_core::Event::PendingApproval { conversation_id, tools });
        }
    }
    QueryResult::Ack
}

fn get_status(state: &SharedState, session_id: Option<String>) -> QueryResult {
    let Some(conversation_id) = resolve_session(state, session_id) else {
        return QueryResult::Status { status: None };
    };
    let registry = state.registry.lock();
    let Some(entry) = registry.entry(&conversation_id) else {
        return QueryResult::Status { status: None };
    };
    let contexts = state.contexts.lock();
    let ctx = contexts.get(&conversation_id);
    let timeline = registry.timeline(&conversation_id);
    let recent_activity = timeline
        .map(|t| {
            detect::recent_activity(t, RECENT_ACTIVITY_LIMIT)
                .into_iter()
                .map(|a| RecentActivity { name: a.name, input_summary: a.input_summary, output: a.output })
                .collect()
        })
        .unwrap_or_default();

    let status = StatusSummary {
        is_running: entry.status == companion_core::SessionStatus::Working,
        is_waiting_for_input: entry.is_waiting_for_input(),
        last_activity_ms: entry.last_updated_ms,
        conversation_path: ctx.map(|c| c.path.display().to_string()).unwrap_or_default(),
        project_path: ctx.and_then(|c| state.project_path_for(&c.encoded_dir)),
        current_activity: entry.current_activity.clone(),
        recent_activity,
    };
    QueryResult::Status { status: Some(status) }
}

fn conversation_path(state: &SharedState, conversation_id: &ConversationId, encoded_dir: &str) -> String {
    let contexts = state.contexts.lock();
    if let Some(ctx) = contexts.get(conversation_id) {
        return ctx.path.display().to_string();
    }
    state.config.watched_root.join(encoded_dir).join(format!("{conversation_id}.jsonl")).display().to_string()
}

fn get_conversation_chain(state: &SharedState, session_id: &str) -> QueryResult {
    let session_name = SessionName::new(session_id);
    let mapping_store = state.mapping_store.lock();
    let paths = mapping_store
        .document()
        .history
        .iter()
        .filter(|m| m.session_name == session_name)
        .take(CONVERSATION_CHAIN_LIMIT)
        .map(|m| conversation_path(state, &m.conversation_id, &m.encoded_dir))
        .collect();
    QueryResult::ConversationChain { paths }
}

fn get_server_summary(state: &SharedState, tmux_filter: Option<Vec<String>>, now_ms: i64) -> QueryResult {
    let filter: Option<std::collections::HashSet<String>> = tmux_filter.map(|v| v.into_iter().collect());
    let registry = state.registry.lock();
    let cutoff_ms = now_ms - SERVER_SUMMARY_WINDOW_MS;

    let sessions = registry
        .entries()
        .filter(|e| e.session_name.is_some())
        .filter(|e| match &filter {
            None => true,
            Some(f) => e.session_name.as_ref().is_some_and(|n| f.contains(n.as_str())),
        })
        .map(|e| {
            let recent_timestamps_ms = registry
                .timeline(&e.conversation_id)
                .map(|t| {
                    t.entries
                        .iter()
                        .filter_map(|entry| entry.timestamp_ms())
                        .filter(|ts| *ts >= cutoff_ms)
                        .collect()
                })
                .unwrap_or_default();
            ServerSummaryEntry {
                session_id: e.session_name.as_ref().map(|n| n.to_string()).unwrap_or_default(),
                session_name: e.session_name.as_ref().map(|n| n.to_string()),
                status: e.status,
                task_summary: e.current_activity.clone(),
                recent_timestamps_ms,
            }
        })
        .collect();
    QueryResult::ServerSummary { sessions }
}

fn get_tmux_session_for_conversation(state: &SharedState, conversation_id: &str) -> QueryResult {
    let registry = state.registry.lock();
    let session_name =
        registry.entry(&ConversationId::new(conversation_id)).and_then(|e| e.session_name.as_ref()).map(|n| n.to_string());
    QueryResult::TmuxSession { session_name }
}

fn get_active_conversation(state: &SharedState) -> QueryResult {
    let registry = state.registry.lock();
    let session_id = registry
        .active_conversation()
        .and_then(|id| registry.entry(id))
        .and_then(|e| e.session_name.as_ref())
        .map(|n| n.to_string());
    QueryResult::ActiveConversation { session_id }
}

fn set_active_session(state: &SharedState, session_name: &str) -> QueryResult {
    let mut registry = state.registry.lock();
    let conversation_id = registry.conversation_for_session(&SessionName::new(session_name)).cloned();
    registry.set_active_conversation(conversation_id);
    QueryResult::Ack
}

fn clear_active_session(state: &SharedState) -> QueryResult {
    state.registry.lock().set_active_conversation(None);
    QueryResult::Ack
}

fn mark_session_as_new(state: &SharedState, session_name: String, now_ms: i64) -> QueryResult {
    let mut resolver_state: parking_lot::MutexGuard<'_, ResolverState> = state.resolver_state.lock();
    resolver_state.mark_new(SessionName::new(session_name), now_ms);
    QueryResult::Ack
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
