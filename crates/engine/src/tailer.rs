// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recursively watches one root directory for `*.jsonl` create/modify
//! events and debounces them into one [`TailEvent`] per conversation per
//! 150 ms window (spec §4.1).
//!
//! Grounded on the template's `notify`-backed agent watcher
//! (`crates/adapters/src/agent/watcher.rs::create_file_watcher`), adapted
//! from watching a single known file to recursively watching a directory
//! tree with per-conversation debounce instead of per-agent liveness
//! polling.

use companion_core::ConversationId;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;

/// Per-conversation debounce window (spec §4.1).
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

/// Age threshold beyond which a not-yet-tracked file is ignored during the
/// initial directory scan (spec §4.1).
pub const AGE_FILTER: Duration = Duration::from_secs(120);

const TICK_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailEvent {
    pub conversation_id: ConversationId,
    pub path: PathBuf,
}

/// True if any path component is literally `subagents` (spec §4.1).
pub fn path_contains_subagents(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == "subagents")
}

/// True if `modified` is older than `threshold` relative to `now`. Used to
/// filter the initial directory scan; live modifications to already-tracked
/// conversations always bypass this (spec §4.1).
pub fn is_stale(modified: SystemTime, now: SystemTime, threshold: Duration) -> bool {
    now.duration_since(modified).map(|age| age > threshold).unwrap_or(false)
}

/// Conversation id (the JSONL file's stem) for a path, if it looks like one
/// of our logs.
pub fn conversation_id_for_path(path: &Path) -> Option<ConversationId> {
    if path.extension()?.to_str()? != "jsonl" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(ConversationId::new(stem))
}

/// The encoded-directory component of `path`, i.e. its immediate parent's
/// file name — `<root>/<encoded_dir>/<conversation>.jsonl`.
pub fn encoded_dir_for_path(path: &Path) -> Option<String> {
    path.parent().and_then(|p| p.file_name()).map(|n| n.to_string_lossy().to_string())
}

pub struct FileTailer {
    root: PathBuf,
    watcher: RecommendedWatcher,
    raw_rx: mpsc::Receiver<PathBuf>,
}

impl FileTailer {
    /// Starts watching `root` recursively. The returned tailer must be
    /// driven by [`FileTailer::run`] to actually emit debounced events.
    pub fn watch(root: impl Into<PathBuf>) -> Result<Self, notify::Error> {
        let root = root.into();
        let (tx, raw_rx) = mpsc::channel(1024);
        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            let Ok(event) = res else { return };
            if !matches!(event.kind, notify::EventKind::Create(_) | notify::EventKind::Modify(_)) {
                return;
            }
            for path in event.paths {
                let _ = tx.blocking_send(path);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        Ok(Self { root, watcher, raw_rx })
    }

    /// Re-registers the watch on `root`, used when a permanently failing
    /// watch needs to recover on the next sweep (spec §4.1 "Failure").
    pub fn rewatch(&mut self) -> Result<(), notify::Error> {
        let _ = self.watcher.unwatch(&self.root);
        self.watcher.watch(&self.root, RecursiveMode::Recursive)
    }

    /// Drives the debounce loop, sending one [`TailEvent`] per conversation
    /// per quiet window to `out`. `is_known` reports whether a conversation
    /// is already tracked, so the age filter only applies to new ones.
    /// `is_in_scope_dir` gates the same not-yet-known files against the
    /// conversation's encoded directory currently hosting an in-scope tmux
    /// session (spec §4.1) — an already-tracked conversation is never
    /// dropped this way even if its session later exits; eviction of those
    /// is the resolver sweep's job, not the tailer's.
    /// Runs until the output channel is closed.
    pub async fn run(
        mut self,
        is_known: impl Fn(&ConversationId) -> bool + Send + 'static,
        is_in_scope_dir: impl Fn(&str) -> bool + Send + 'static,
        out: mpsc::Sender<TailEvent>,
    ) {
        let mut pending: HashMap<ConversationId, (PathBuf, Instant)> = HashMap::new();
        let mut ticker = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                maybe_path = self.raw_rx.recv() => {
                    match maybe_path {
                        Some(path) => self.accept(path, &is_known, &is_in_scope_dir, &mut pending),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let due: Vec<ConversationId> =
                        pending.iter().filter(|(_, (_, fire_at))| *fire_at <= now).map(|(id, _)| id.clone()).collect();
                    for id in due {
                        if let Some((path, _)) = pending.remove(&id) {
                            if out.send(TailEvent { conversation_id: id, path }).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    fn accept(
        &self,
        path: PathBuf,
        is_known: &impl Fn(&ConversationId) -> bool,
        is_in_scope_dir: &impl Fn(&str) -> bool,
        pending: &mut HashMap<ConversationId, (PathBuf, Instant)>,
    ) {
        if path_contains_subagents(&path) || !path.starts_with(&self.root) {
            return;
        }
        let Some(conversation_id) = conversation_id_for_path(&path) else { return };

        if !is_known(&conversation_id) {
            if let Ok(Ok(modified)) = std::fs::metadata(&path).map(|m| m.modified()) {
                if is_stale(modified, SystemTime::now(), AGE_FILTER) {
                    return;
                }
            }
            let encoded_dir = encoded_dir_for_path(&path).unwrap_or_default();
            if !is_in_scope_dir(&encoded_dir) {
                return;
            }
        }

        pending.insert(conversation_id, (path, Instant::now() + DEBOUNCE_WINDOW));
    }
}

#[cfg(test)]
#[path = "tailer_tests.rs"]
mod tests;
