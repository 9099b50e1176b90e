// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The background pipeline: File Tailer → parse/registry pass, and a
//! periodic Tmux Probe → Resolver sweep (spec §4.6, §4.5, §5).
//!
//! Grounded on the template's `lifecycle/startup.rs` sequencing (wire
//! components, log milestones, run until shutdown) generalized from a
//! job-orchestration bootstrap to this daemon's tail/resolve/registry loop.

use companion_adapters::TmuxAdapter;
use companion_core::{decode_encoded_dir, encode_dir, ConversationId, SessionName};
use companion_engine::{ConversationFile, FileTailer, InScopeSession, Resolver, TailEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::DaemonError;
use crate::state::{ConversationContext, SharedState};

/// Interval between Tmux Probe → Resolver sweeps (spec §4.5).
pub const RESOLVER_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run<T: TmuxAdapter>(
    state: Arc<SharedState>,
    tmux: T,
    shutdown: CancellationToken,
) -> Result<(), DaemonError> {
    let (tail_tx, mut tail_rx) = mpsc::channel::<TailEvent>(1024);
    let tailer = FileTailer::watch(state.config.watched_root.clone())
        .map_err(|source| DaemonError::Watch { path: state.config.watched_root.clone(), source })?;

    let tail_state = state.clone();
    let tail_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let is_known = {
            let state = tail_state.clone();
            move |id: &ConversationId| state.registry.lock().entry(id).is_some()
        };
        let is_in_scope_dir = {
            let state = tail_state.clone();
            move |encoded_dir: &str| state.is_in_scope_dir(encoded_dir)
        };
        tokio::select! {
            _ = tailer.run(is_known, is_in_scope_dir, tail_tx) => {}
            _ = tail_shutdown.cancelled() => {}
        }
    });

    let resolver_state = state.clone();
    let resolver_tmux = tmux.clone();
    let resolver_shutdown = shutdown.clone();
    tokio::spawn(async move {
        run_resolver_loop(resolver_state, resolver_tmux, resolver_shutdown).await;
    });

    loop {
        tokio::select! {
            event = tail_rx.recv() => {
                match event {
                    Some(event) => process_tail_event(&state, event),
                    None => break,
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    state.mapping_store.lock().save_best_effort();
    Ok(())
}

fn process_tail_event(state: &Arc<SharedState>, event: TailEvent) {
    let content = match std::fs::read_to_string(&event.path) {
        Ok(content) => content,
        Err(err) => {
            tracing::debug!(path = %event.path.display(), error = %err, "failed to read conversation file");
            return;
        }
    };

    let encoded_dir = companion_engine::tailer::encoded_dir_for_path(&event.path).unwrap_or_default();

    let now_ms = now_ms();
    let dir_owners = dir_owners_for(state, &encoded_dir);
    let mapping = state.mapping_store.lock().document().clone();

    let outcome = {
        let mut registry = state.registry.lock();
        registry.apply_pass(&event.conversation_id, &content, now_ms, &mapping, &dir_owners)
    };

    let last_message = {
        let registry = state.registry.lock();
        registry
            .timeline(&event.conversation_id)
            .and_then(|t| t.last())
            .map(|entry| last_message_text(entry))
    };

    let source_mtime_ms = std::fs::metadata(&event.path).and_then(|m| m.modified()).map(epoch_ms).unwrap_or(now_ms);

    state.contexts.lock().insert(
        event.conversation_id.clone(),
        ConversationContext { path: event.path.clone(), encoded_dir: encoded_dir.clone(), last_message, source_mtime_ms },
    );

    if let Some(session) = outcome.compaction_session {
        state.resolver_state.lock().mark_compacted(session);
    }

    let event_bus = state.event_bus.lock();
    for event in outcome.events {
        event_bus.broadcast(event);
    }
}

fn last_message_text(entry: &companion_core::TimelineEntry) -> String {
    match entry {
        companion_core::TimelineEntry::User { content, .. }
        | companion_core::TimelineEntry::Assistant { content, .. }
        | companion_core::TimelineEntry::System { content, .. }
        | companion_core::TimelineEntry::QueueOperation { content, .. } => content.clone(),
        companion_core::TimelineEntry::Unknown { .. } => String::new(),
    }
}

/// Candidate owning sessions for a conversation file under `encoded_dir`:
/// the live, tmux-probed sessions currently rooted there (spec §4.5), not a
/// view derived from conversations the registry has already resolved — a
/// session with no tracked conversation yet must still count as a
/// candidate, or a lone pre-existing owner wins ownership of every new file
/// in a shared directory by default.
fn dir_owners_for(state: &Arc<SharedState>, encoded_dir: &str) -> Vec<SessionName> {
    state.live_sessions_for(encoded_dir)
}

async fn run_resolver_loop<T: TmuxAdapter>(state: Arc<SharedState>, tmux: T, shutdown: CancellationToken) {
    let resolver = Resolver::new(tmux.clone(), state.config.watched_root.clone());
    let mut ticker = tokio::time::interval(RESOLVER_SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.cancelled() => break,
        }

        let sessions = match probe_sessions(&tmux, &state.config.tagged_env_var, &state.config.tagged_env_value).await {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::warn!(error = %err, "tmux probe failed, skipping sweep");
                continue;
            }
        };
        let conversations = scan_conversations(&state.config.watched_root);

        {
            let mut working_dirs = state.working_dirs.lock();
            working_dirs.clear();
            for session in &sessions {
                working_dirs.insert(session.encoded_dir.clone(), decoded_working_dir(&session.encoded_dir));
            }
        }

        let mut live_sessions: HashMap<String, Vec<SessionName>> = HashMap::new();
        for session in &sessions {
            live_sessions.entry(session.encoded_dir.clone()).or_default().push(session.name.clone());
        }
        state.replace_live_sessions(live_sessions);

        evict_out_of_scope_conversations(&state);

        let now_ms = now_ms();
        // `sweep` awaits (it shells out to tmux), so the state it mutates is
        // taken out of its mutex for the duration rather than held across
        // the await point — parking_lot guards aren't Send by default.
        let mut document = state.mapping_store.lock().document().clone();
        let mut resolver_state = std::mem::take(&mut *state.resolver_state.lock());
        let changed = resolver.sweep(&mut document, &mut resolver_state, &sessions, &conversations, now_ms).await;
        *state.resolver_state.lock() = resolver_state;
        if changed {
            let mut mapping_store = state.mapping_store.lock();
            mapping_store.replace_document(document);
            mapping_store.save_best_effort();
        }
    }
}

/// Drops conversations whose tracked directory no longer hosts any in-scope
/// tmux session, giving `Registry::remove` its eviction path (spec §3 Data
/// Model, "any state → terminal"). Skipped entirely before the first sweep
/// populates `live_sessions`, since an empty probe at startup must not be
/// read as "everything just went out of scope".
fn evict_out_of_scope_conversations(state: &Arc<SharedState>) {
    let stale: Vec<ConversationId> = {
        let contexts = state.contexts.lock();
        contexts
            .iter()
            .filter(|(_, ctx)| !state.is_in_scope_dir(&ctx.encoded_dir))
            .map(|(id, _)| id.clone())
            .collect()
    };
    if stale.is_empty() {
        return;
    }
    let mut registry = state.registry.lock();
    let mut contexts = state.contexts.lock();
    for conversation_id in stale {
        registry.remove(&conversation_id);
        contexts.remove(&conversation_id);
    }
}

fn decoded_working_dir(encoded_dir: &str) -> String {
    decode_encoded_dir(encoded_dir, &[]).unwrap_or_else(|| encoded_dir.to_string())
}

async fn probe_sessions<T: TmuxAdapter>(
    tmux: &T,
    tagged_env_var: &str,
    tagged_env_value: &str,
) -> Result<Vec<InScopeSession>, companion_adapters::TmuxError> {
    let names = tmux.list_sessions().await?;
    let mut sessions = Vec::new();
    for name in names {
        let Ok(Some(value)) = tmux.session_env(&name, tagged_env_var).await else { continue };
        if value != tagged_env_value {
            continue;
        }
        let Ok(working_dir) = tmux.working_dir(&name).await else { continue };
        let pane_pid = tmux.pane_pid(&name).await.ok();
        sessions.push(InScopeSession { name: SessionName::new(name), encoded_dir: encode_dir(&working_dir), pane_pid });
    }
    Ok(sessions)
}

/// Scans `<watched_root>/<encoded_dir>/*.jsonl`, skipping `subagents/`
/// entries, to build the resolver's candidate file list.
fn scan_conversations(watched_root: &std::path::Path) -> Vec<ConversationFile> {
    let mut files = Vec::new();
    let Ok(dirs) = std::fs::read_dir(watched_root) else { return files };
    for dir_entry in dirs.flatten() {
        let dir_path = dir_entry.path();
        if !dir_path.is_dir() {
            continue;
        }
        let Some(encoded_dir) = dir_path.file_name().map(|n| n.to_string_lossy().to_string()) else { continue };
        let Ok(entries) = std::fs::read_dir(&dir_path) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if companion_engine::tailer::path_contains_subagents(&path) {
                continue;
            }
            let Some(conversation_id) = companion_engine::tailer::conversation_id_for_path(&path) else { continue };
            let modified_ms = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|t| epoch_ms(t))
                .unwrap_or_default();
            files.push(ConversationFile { conversation_id, path, encoded_dir: encoded_dir.clone(), modified_ms });
        }
    }
    files
}

fn epoch_ms(time: std::time::SystemTime) -> i64 {
    time.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

fn now_ms() -> i64 {
    epoch_ms(std::time::SystemTime::now())
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
