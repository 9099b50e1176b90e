// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Registry & Event Engine (spec §4.6): holds the canonical
//! conversation cache, consumes parsed timelines produced per file-change
//! pass, and emits [`Event`]s.

use companion_core::{
    registry::{SessionRegistryEntry, SessionStatus},
    ConversationId, Event, MappingStoreDocument, SessionName, ToolCall, ToolStatus,
};
use companion_transcript::{detect, parser};
use std::collections::HashMap;

/// Approval-gated tools that are *interactive questions* rather than
/// execution gates — these never get the 3 s waiting-confirmation debounce
/// because there is nothing running that might auto-resolve them.
const INTERACTIVE_TOOLS: &[&str] = &["AskUserQuestion", "ExitPlanMode"];

/// Window after engine startup during which the most-recently-modified
/// in-scope conversation may be auto-selected as active (spec §4.6).
pub const INITIAL_LOAD_WINDOW_MS: i64 = 3_000;

/// The waiting-confirmation debounce (spec §4.6 step 2).
pub const WAITING_CONFIRMATION_MS: i64 = 3_000;

struct Tracked {
    entry: SessionRegistryEntry,
    timeline: companion_core::Timeline,
    last_compaction_line: usize,
    previous_status: SessionStatus,
    previous_pending_ids: Vec<String>,
    previous_error_count: usize,
    pending_confirmation_deadline_ms: Option<i64>,
}

impl Tracked {
    fn new(conversation_id: ConversationId, now_ms: i64) -> Self {
        Self {
            entry: SessionRegistryEntry::new(conversation_id, now_ms),
            timeline: companion_core::Timeline::default(),
            last_compaction_line: 0,
            previous_status: SessionStatus::Idle,
            previous_pending_ids: Vec::new(),
            previous_error_count: 0,
            pending_confirmation_deadline_ms: None,
        }
    }
}

/// Holds one tracked conversation per discovered JSONL file and turns raw
/// file content into registry state and outbound events.
pub struct Registry {
    tracked: HashMap<ConversationId, Tracked>,
    active_conversation: Option<ConversationId>,
    active_selected_explicitly: bool,
    started_at_ms: i64,
}

/// The result of a single file-change pass (spec §4.6).
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub events: Vec<Event>,
    /// Set when a live (not initial-load) compaction was detected, so the
    /// caller can flag the owning session as compacted for the resolver's
    /// step 6.
    pub compaction_session: Option<SessionName>,
}

impl Registry {
    pub fn new(now_ms: i64) -> Self {
        Self { tracked: HashMap::new(), active_conversation: None, active_selected_explicitly: false, started_at_ms: now_ms }
    }

    pub fn entry(&self, conversation_id: &ConversationId) -> Option<&SessionRegistryEntry> {
        self.tracked.get(conversation_id).map(|t| &t.entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SessionRegistryEntry> {
        self.tracked.values().map(|t| &t.entry)
    }

    /// The cached timeline for `conversation_id`, as of the last
    /// [`Registry::apply_pass`] (spec §6 `getMessages`).
    pub fn timeline(&self, conversation_id: &ConversationId) -> Option<&companion_core::Timeline> {
        self.tracked.get(conversation_id).map(|t| &t.timeline)
    }

    /// The conversation id currently mapped to tmux session `name`, if any.
    pub fn conversation_for_session(&self, name: &SessionName) -> Option<&ConversationId> {
        self.tracked.iter().find(|(_, t)| t.entry.session_name.as_ref() == Some(name)).map(|(id, _)| id)
    }

    pub fn active_conversation(&self) -> Option<&ConversationId> {
        self.active_conversation.as_ref()
    }

    pub fn set_active_conversation(&mut self, conversation_id: Option<ConversationId>) {
        self.active_conversation = conversation_id;
        self.active_selected_explicitly = true;
    }

    fn is_active(&self, conversation_id: &ConversationId) -> bool {
        self.active_conversation.as_ref() == Some(conversation_id)
    }

    /// Runs one file-change pass for `conversation_id` (spec §4.6 steps 1-5).
    ///
    /// `mapping` is the current persisted mapping set, used to resolve the
    /// owning session by reverse lookup. `dir_owners` lists every in-scope
    /// session sharing `encoded_dir`, for the path-based fallback when no
    /// direct mapping exists and exactly one candidate remains.
    pub fn apply_pass(
        &mut self,
        conversation_id: &ConversationId,
        content: &str,
        now_ms: i64,
        mapping: &MappingStoreDocument,
        dir_owners: &[SessionName],
    ) -> PassOutcome {
        let is_initial_load = now_ms - self.started_at_ms <= INITIAL_LOAD_WINDOW_MS;
        let timeline = parser::parse_timeline(content);
        let message_count = timeline.message_count();

        let tracked = self
            .tracked
            .entry(conversation_id.clone())
            .or_insert_with(|| Tracked::new(conversation_id.clone(), now_ms));

        let message_count_changed = message_count != tracked.entry.message_count;

        let (compaction_event, new_last_line) = parser::detect_compaction(content, tracked.last_compaction_line);
        tracked.last_compaction_line = new_last_line;

        let waiting_raw = detect::waiting_for_input(&timeline);
        let pending: Vec<(String, String)> = detect::pending_approval_tools(&timeline);
        let pending_ids: Vec<String> = pending.iter().map(|(_, id)| id.clone()).collect();
        let error_count = count_error_tools(&timeline);
        let activity = detect::current_activity(&timeline);

        let entering_waiting = waiting_raw && tracked.previous_status != SessionStatus::Waiting;
        let triggered_by_execution_gate =
            pending.iter().any(|(name, _)| !INTERACTIVE_TOOLS.contains(&name.as_str()));

        if !waiting_raw {
            tracked.pending_confirmation_deadline_ms = None;
        } else if entering_waiting && triggered_by_execution_gate && tracked.pending_confirmation_deadline_ms.is_none() {
            tracked.pending_confirmation_deadline_ms = Some(now_ms + WAITING_CONFIRMATION_MS);
        }

        let waiting_confirmed = waiting_raw
            && match tracked.pending_confirmation_deadline_ms {
                Some(deadline) => now_ms >= deadline,
                None => true,
            };

        let new_status = if error_count > tracked.previous_error_count {
            SessionStatus::Error
        } else if waiting_raw && waiting_confirmed {
            SessionStatus::Waiting
        } else if timeline.is_empty() {
            SessionStatus::Idle
        } else {
            SessionStatus::Working
        };

        let was_running = tracked.previous_status == SessionStatus::Working;
        let now_running = new_status == SessionStatus::Working;
        let waiting_changed = new_status != tracked.previous_status;
        let pending_ids_changed = !pending_ids.is_empty() && pending_ids != tracked.previous_pending_ids;
        let error_increased = error_count > tracked.previous_error_count;
        let session_completed = was_running && !now_running;

        tracked.entry.status = new_status;
        tracked.entry.waiting_confirmed = waiting_confirmed;
        tracked.entry.current_activity = activity.clone();
        tracked.entry.message_count = message_count;
        tracked.entry.last_updated_ms = now_ms;
        tracked.entry.pending_approval_tools = pending
            .iter()
            .map(|(name, id)| ToolCall::new(id.as_str(), name.as_str(), serde_json::Value::Null))
            .collect();
        tracked.timeline = timeline.clone();

        let previous_owner = tracked.entry.session_name.clone();
        let owner = resolve_owner(conversation_id, mapping, dir_owners);
        if let Some(owner) = &owner {
            tracked.entry.session_name = Some(owner.clone());
        }
        // A conversation's first pass or two commonly lands before the
        // owning session is resolvable (no direct mapping yet, or more than
        // one live candidate sharing the directory). Once ownership is
        // finally established, re-emit the conversation's current state
        // rather than relying on message-count/status deltas that already
        // happened while it was ownerless — otherwise a quiet "waiting for
        // input" turn never reaches the client at all.
        let owner_newly_established = owner.is_some() && previous_owner.is_none();

        if is_initial_load && !self.active_selected_explicitly && self.active_conversation.is_none() {
            self.active_conversation = Some(conversation_id.clone());
        }

        let mut outcome = PassOutcome::default();

        if let Some(owner) = owner {
            let is_active = self.is_active(conversation_id);

            if message_count_changed || owner_newly_established {
                outcome.events.push(Event::ConversationUpdate { conversation_id: conversation_id.clone(), entries: timeline.entries.clone() });
            }
            if waiting_changed || message_count_changed || owner_newly_established {
                outcome.events.push(Event::StatusChange {
                    conversation_id: conversation_id.clone(),
                    status: new_status,
                    previous_status: tracked.previous_status,
                });
                if !is_active {
                    outcome.events.push(Event::OtherSessionActivity { conversation_id: conversation_id.clone(), session_name: Some(owner.clone()) });
                }
            }
            if pending_ids_changed || (owner_newly_established && !pending_ids.is_empty()) {
                outcome.events.push(Event::PendingApproval { conversation_id: conversation_id.clone(), tools: tracked.entry.pending_approval_tools.clone() });
            }
            if let Some(event) = &compaction_event {
                if !is_initial_load {
                    outcome.events.push(Event::Compaction { conversation_id: conversation_id.clone(), summary: event.summary.clone() });
                    outcome.compaction_session = Some(owner.clone());
                }
            }
            if error_increased {
                let message = tracked.timeline.entries.last().map(|_| "a tool call failed".to_string()).unwrap_or_default();
                outcome.events.push(Event::ErrorDetected { conversation_id: conversation_id.clone(), message });
            }
            if session_completed {
                outcome.events.push(Event::SessionCompleted { conversation_id: conversation_id.clone() });
            }
        }

        tracked.previous_status = new_status;
        tracked.previous_pending_ids = pending_ids;
        tracked.previous_error_count = error_count;

        outcome
    }

    /// Flips any conversation whose waiting-confirmation timer has elapsed
    /// into the confirmed `Waiting` status even without a new file change,
    /// and emits the resulting `status-change` (spec §4.6 step 2).
    pub fn confirm_due_timers(&mut self, now_ms: i64) -> Vec<Event> {
        let mut events = Vec::new();
        for tracked in self.tracked.values_mut() {
            let Some(deadline) = tracked.pending_confirmation_deadline_ms else { continue };
            if now_ms < deadline || tracked.entry.waiting_confirmed {
                continue;
            }
            tracked.entry.waiting_confirmed = true;
            tracked.pending_confirmation_deadline_ms = None;
            events.push(Event::StatusChange {
                conversation_id: tracked.entry.conversation_id.clone(),
                status: tracked.entry.status,
                previous_status: tracked.previous_status,
            });
            tracked.previous_status = tracked.entry.status;
        }
        events
    }

    /// Drops a conversation whose backing file has been pruned (spec §4.6
    /// state machine, "any state → terminal").
    pub fn remove(&mut self, conversation_id: &ConversationId) {
        self.tracked.remove(conversation_id);
        if self.active_conversation.as_ref() == Some(conversation_id) {
            self.active_conversation = None;
            self.active_selected_explicitly = false;
        }
    }
}

fn count_error_tools(timeline: &companion_core::Timeline) -> usize {
    timeline.entries.iter().flat_map(|e| e.tool_calls()).filter(|t| t.status == ToolStatus::Error).count()
}

fn resolve_owner(conversation_id: &ConversationId, mapping: &MappingStoreDocument, dir_owners: &[SessionName]) -> Option<SessionName> {
    if let Some(m) = mapping.find(conversation_id) {
        return Some(m.session_name.clone());
    }
    match dir_owners {
        [only] => Some(only.clone()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
