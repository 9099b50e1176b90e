// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation↔session resolver (spec §4.5): for every in-scope tmux
//! session, chooses at most one current conversation id, applying the
//! six-step cascade in order and stopping at the first strategy that
//! resolves a session.

use crate::tailer::path_contains_subagents;
use companion_adapters::TmuxAdapter;
use companion_core::{ConversationId, Mapping, MappingSource, MappingStoreDocument, SessionName};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One JSONL file known to the tailer, as the resolver needs to see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationFile {
    pub conversation_id: ConversationId,
    pub path: PathBuf,
    pub encoded_dir: String,
    pub modified_ms: i64,
}

/// One in-scope (sentinel-tagged) tmux session, as the resolver needs to
/// see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InScopeSession {
    pub name: SessionName,
    pub encoded_dir: String,
    pub pane_pid: Option<i32>,
}

/// Bookkeeping the resolver needs across sweeps that doesn't belong in the
/// persisted [`MappingStoreDocument`].
#[derive(Debug, Default)]
pub struct ResolverState {
    /// Sessions registered via `markSessionAsNew`, with the epoch-ms they
    /// were created (spec §4.5 step 2).
    pub newly_created: HashMap<SessionName, i64>,
    /// Sessions flagged by the registry after observing a live compaction
    /// event on their current mapping (spec §4.5 "Compacted flag
    /// lifecycle").
    pub compacted: HashSet<SessionName>,
}

impl ResolverState {
    pub fn mark_new(&mut self, session: SessionName, created_at_ms: i64) {
        self.newly_created.insert(session, created_at_ms);
    }

    pub fn mark_compacted(&mut self, session: SessionName) {
        self.compacted.insert(session);
    }

    pub fn clear_compacted(&mut self, session: &SessionName) {
        self.compacted.remove(session);
    }
}

/// Shells out via `tmux` and probes `/proc` to resolve conversations to
/// sessions.
pub struct Resolver<T: TmuxAdapter> {
    tmux: T,
    watched_root: PathBuf,
    scrollback_lines: usize,
}

/// Minimum length of a scrollback line to be considered a candidate user
/// input for strategy 4 matching (spec §4.5 step 4).
const MIN_SCROLLBACK_LINE_LEN: usize = 8;

impl<T: TmuxAdapter> Resolver<T> {
    pub fn new(tmux: T, watched_root: impl Into<PathBuf>) -> Self {
        Self { tmux, watched_root: watched_root.into(), scrollback_lines: companion_adapters::DEFAULT_SCROLLBACK_LINES }
    }

    /// Runs one resolver sweep, mutating `document` in place and returning
    /// whether the mapping set changed (so the caller knows to persist).
    pub async fn sweep(
        &self,
        document: &mut MappingStoreDocument,
        state: &mut ResolverState,
        sessions: &[InScopeSession],
        conversations: &[ConversationFile],
        now_ms: i64,
    ) -> bool {
        let before = document.mappings.clone();

        let mut unmapped: Vec<&InScopeSession> = Vec::new();
        for session in sessions {
            if keep_existing_mapping(document, &session.name, conversations) {
                continue;
            }
            unmapped.push(session);
        }

        let by_dir = group_by_encoded_dir(conversations);
        let claimed: HashSet<ConversationId> =
            document.mappings.iter().map(|m| m.conversation_id.clone()).collect();

        let mut still_unmapped = Vec::new();
        for session in unmapped {
            if is_newly_created_guard_active(session, state, &by_dir, now_ms) {
                continue;
            }

            if let Some(conversation_id) = self.pid_based_match(session, conversations).await {
                document.upsert(Mapping {
                    conversation_id,
                    session_name: session.name.clone(),
                    encoded_dir: session.encoded_dir.clone(),
                    source: MappingSource::PanePid,
                    mapped_at_ms: now_ms,
                });
                continue;
            }

            still_unmapped.push(session);
        }

        // Strategy 4: scrollback matching, only for sessions sharing a
        // directory with another session (ambiguity is the whole point).
        let mut remaining = Vec::new();
        for session in still_unmapped {
            let siblings = by_dir.get(&session.encoded_dir).map(Vec::len).unwrap_or(0);
            if siblings >= 2 {
                let candidates: Vec<&ConversationFile> = by_dir
                    .get(&session.encoded_dir)
                    .into_iter()
                    .flatten()
                    .filter(|c| !claimed.contains(&c.conversation_id))
                    .collect();
                if let Some(conversation_id) = self.scrollback_match(session, &candidates).await {
                    document.upsert(Mapping {
                        conversation_id,
                        session_name: session.name.clone(),
                        encoded_dir: session.encoded_dir.clone(),
                        source: MappingSource::Scrollback,
                        mapped_at_ms: now_ms,
                    });
                    continue;
                }
            }
            remaining.push(session);
        }

        // Strategy 5: elimination.
        let claimed: HashSet<ConversationId> =
            document.mappings.iter().map(|m| m.conversation_id.clone()).collect();
        apply_elimination(document, &remaining, &by_dir, &claimed, now_ms);

        // Strategy 6: compaction re-mapping.
        apply_compaction_remap(document, state, sessions, conversations, now_ms);

        document.mappings != before
    }

    async fn pid_based_match(&self, session: &InScopeSession, conversations: &[ConversationFile]) -> Option<ConversationId> {
        let pane_pid = session.pane_pid?;
        let path = pid_owned_conversation_path(pane_pid, &self.watched_root)?;
        conversations.iter().find(|c| c.path == path).map(|c| c.conversation_id.clone())
    }

    async fn scrollback_match(&self, session: &InScopeSession, candidates: &[&ConversationFile]) -> Option<ConversationId> {
        if candidates.is_empty() {
            return None;
        }
        let scrollback = self.tmux.capture_scrollback(session.name.as_str(), self.scrollback_lines).await.ok()?;
        let input_lines = extract_candidate_input_lines(&scrollback);

        for line in input_lines {
            let mut matches: Vec<&ConversationId> = Vec::new();
            for candidate in candidates {
                if file_tail_contains(&candidate.path, &line) {
                    matches.push(&candidate.conversation_id);
                }
            }
            if matches.len() == 1 {
                return Some(matches[0].clone());
            }
        }
        None
    }
}

/// Spec §4.5 step 1: preserve an existing mapping whose conversation is
/// still tracked, or whose backing file exists on disk.
fn keep_existing_mapping(document: &MappingStoreDocument, session: &SessionName, conversations: &[ConversationFile]) -> bool {
    let Some(mapping) = document.mappings.iter().find(|m| &m.session_name == session) else { return false };
    conversations.iter().any(|c| c.conversation_id == mapping.conversation_id)
}

/// Spec §4.5 step 2: a session flagged new stays unmapped until a JSONL
/// file appears in its directory with an mtime strictly after the
/// session's creation time and not already owned by another session.
fn is_newly_created_guard_active(
    session: &InScopeSession,
    state: &ResolverState,
    by_dir: &HashMap<String, Vec<&ConversationFile>>,
    _now_ms: i64,
) -> bool {
    let Some(&created_at_ms) = state.newly_created.get(&session.name) else { return false };
    let has_fresh_file = by_dir
        .get(&session.encoded_dir)
        .into_iter()
        .flatten()
        .any(|c| c.modified_ms > created_at_ms);
    !has_fresh_file
}

fn group_by_encoded_dir(conversations: &[ConversationFile]) -> HashMap<String, Vec<&ConversationFile>> {
    let mut map: HashMap<String, Vec<&ConversationFile>> = HashMap::new();
    for c in conversations {
        map.entry(c.encoded_dir.clone()).or_default().push(c);
    }
    map
}

/// Spec §4.5 step 5: a shared directory with exactly one unmapped session
/// and exactly one unclaimed conversation resolves unambiguously.
fn apply_elimination(
    document: &mut MappingStoreDocument,
    remaining: &[&InScopeSession],
    by_dir: &HashMap<String, Vec<&ConversationFile>>,
    claimed: &HashSet<ConversationId>,
    now_ms: i64,
) {
    let mut unmapped_per_dir: HashMap<&str, Vec<&InScopeSession>> = HashMap::new();
    for session in remaining {
        unmapped_per_dir.entry(session.encoded_dir.as_str()).or_default().push(session);
    }

    for (dir, sessions) in unmapped_per_dir {
        if sessions.len() != 1 {
            continue;
        }
        let unclaimed: Vec<&&ConversationFile> =
            by_dir.get(dir).into_iter().flatten().filter(|c| !claimed.contains(&c.conversation_id)).collect();
        if unclaimed.len() == 1 {
            let session = sessions[0];
            let conversation = unclaimed[0];
            document.upsert(Mapping {
                conversation_id: conversation.conversation_id.clone(),
                session_name: session.name.clone(),
                encoded_dir: session.encoded_dir.clone(),
                source: MappingSource::SoleCandidate,
                mapped_at_ms: now_ms,
            });
        }
    }
}

/// Spec §4.5 step 6 and "Compacted flag lifecycle": when exactly one
/// session in a shared directory is flagged compacted and a new
/// conversation file has appeared there, rewrite its mapping.
fn apply_compaction_remap(
    document: &mut MappingStoreDocument,
    state: &mut ResolverState,
    sessions: &[InScopeSession],
    conversations: &[ConversationFile],
    now_ms: i64,
) {
    let by_dir = group_by_encoded_dir(conversations);
    let mut compacted_per_dir: HashMap<&str, Vec<&InScopeSession>> = HashMap::new();
    for session in sessions {
        if state.compacted.contains(&session.name) {
            compacted_per_dir.entry(session.encoded_dir.as_str()).or_default().push(session);
        }
    }

    for (dir, flagged) in compacted_per_dir {
        if flagged.len() != 1 {
            continue;
        }
        let session = flagged[0];
        let Some(current_id) = document
            .mappings
            .iter()
            .find(|m| m.session_name == session.name)
            .map(|m| m.conversation_id.clone())
        else {
            continue;
        };
        let candidates: Vec<&&ConversationFile> =
            by_dir.get(dir).into_iter().flatten().filter(|c| c.conversation_id != current_id).collect();
        if candidates.len() == 1 {
            remap_session(
                document,
                &current_id,
                Mapping {
                    conversation_id: candidates[0].conversation_id.clone(),
                    session_name: session.name.clone(),
                    encoded_dir: session.encoded_dir.clone(),
                    source: MappingSource::CompactionRemap,
                    mapped_at_ms: now_ms,
                },
            );
            state.clear_compacted(&session.name);
        }
    }
}

/// Retires the mapping for `old_conversation_id` into history and installs
/// `new_mapping` for the same session, without disturbing any other
/// conversation's mapping (unlike [`MappingStoreDocument::upsert`], which
/// keys on conversation id rather than session).
fn remap_session(document: &mut MappingStoreDocument, old_conversation_id: &ConversationId, new_mapping: Mapping) {
    if let Some(idx) = document.mappings.iter().position(|m| &m.conversation_id == old_conversation_id) {
        let old = document.mappings.remove(idx);
        document.history.push(old);
    }
    document.mappings.push(new_mapping);
}

/// All user-input-looking lines in a captured pane's scrollback: those
/// following the prompt character, at least [`MIN_SCROLLBACK_LINE_LEN`]
/// long, newest first (spec §4.5 step 4).
fn extract_candidate_input_lines(scrollback: &str) -> Vec<String> {
    scrollback
        .lines()
        .rev()
        .filter_map(|line| line.trim_start_matches(['❯', '>', '$']).trim().to_string().into())
        .filter(|line: &String| line.len() >= MIN_SCROLLBACK_LINE_LEN)
        .collect()
}

/// Whether the last 64 KiB of `path` contain `needle`.
fn file_tail_contains(path: &Path, needle: &str) -> bool {
    const TAIL_SIZE: u64 = 64 * 1024;
    let Ok(content) = std::fs::read(path) else { return false };
    let start = content.len().saturating_sub(TAIL_SIZE as usize);
    String::from_utf8_lossy(&content[start..]).contains(needle)
}

/// Strategy 3: walk `pid`'s descendants (via `/proc`) looking for one with
/// an open file descriptor under `watched_root` ending in `.jsonl`, not
/// under a `subagents/` segment.
fn pid_owned_conversation_path(pid: i32, watched_root: &Path) -> Option<PathBuf> {
    let mut candidates = vec![pid];
    candidates.extend(descendant_pids(pid));

    for candidate_pid in candidates {
        for path in open_jsonl_fds(candidate_pid) {
            if path.starts_with(watched_root) && !path_contains_subagents(&path) {
                return Some(path);
            }
        }
    }
    None
}

/// All descendant PIDs of `pid`, via `/proc/<pid>/task/*/children` (Linux).
fn descendant_pids(pid: i32) -> Vec<i32> {
    let mut out = Vec::new();
    let mut frontier = vec![pid];
    while let Some(current) = frontier.pop() {
        let task_dir = format!("/proc/{current}/task");
        let Ok(entries) = std::fs::read_dir(&task_dir) else { continue };
        for entry in entries.flatten() {
            let children_path = entry.path().join("children");
            let Ok(contents) = std::fs::read_to_string(children_path) else { continue };
            for token in contents.split_whitespace() {
                if let Ok(child) = token.parse::<i32>() {
                    out.push(child);
                    frontier.push(child);
                }
            }
        }
    }
    out
}

/// Paths of `.jsonl` files open as file descriptors by `pid`, via
/// `/proc/<pid>/fd` (Linux).
fn open_jsonl_fds(pid: i32) -> Vec<PathBuf> {
    let fd_dir = format!("/proc/{pid}/fd");
    let Ok(entries) = std::fs::read_dir(&fd_dir) else { return Vec::new() };
    entries
        .flatten()
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter(|path| path.extension().is_some_and(|e| e == "jsonl"))
        .collect()
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
