// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers for the two id spaces this system correlates:
//! conversation UUIDs (JSONL basenames) and tmux session names.

crate::define_string_id! {
    /// Filename stem of a conversation's JSONL log. Stable for the life of
    /// the file; a compaction creates a *new* `ConversationId`.
    pub struct ConversationId;
}

crate::define_string_id! {
    /// Name of a tmux session, as reported by `tmux list-sessions`.
    pub struct SessionName;
}

crate::define_string_id! {
    /// Id of a tool-use block within a single assistant message.
    pub struct ToolCallId;
}
