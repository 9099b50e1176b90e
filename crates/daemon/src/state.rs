// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared, lockable state the listener and the orchestrator loop both
//! touch: the registry, the mapping store, the resolver's bookkeeping, and
//! the per-client event bus (spec §5 "single-owner task" generalized to a
//! `parking_lot::Mutex` since the daemon, unlike the template's WAL-backed
//! `EventBus`, has no durability requirement to serialize through one task).

use companion_core::ConversationId;
use companion_engine::{EventBus, Registry, ResolverState};
use companion_storage::MappingStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::CompanionConfig;

/// What the orchestrator knows about one tracked conversation beyond what
/// [`companion_engine::Registry`] stores, needed to fill in the
/// `path`/`projectPath` fields on outbound wire events.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub path: PathBuf,
    pub encoded_dir: String,
    /// Text content of the last timeline entry, refreshed on every parse
    /// pass — the internal [`companion_core::Event`] variants don't all
    /// carry the timeline, so the bridge reads this cache instead of
    /// re-parsing the file for `lastMessage` (spec §6).
    pub last_message: Option<String>,
    /// On-disk mtime of `path` as of the last parse pass, in epoch ms.
    /// `getMessages` compares this against a fresh stat to decide whether
    /// the cached registry timeline is stale (spec §6).
    pub source_mtime_ms: i64,
}

pub struct SharedState {
    pub config: CompanionConfig,
    pub registry: Mutex<Registry>,
    pub mapping_store: Mutex<MappingStore>,
    pub resolver_state: Mutex<ResolverState>,
    pub event_bus: Mutex<EventBus>,
    pub contexts: Mutex<HashMap<ConversationId, ConversationContext>>,
    /// `encoded_dir -> working_dir`, refreshed on every resolver sweep, used
    /// to resolve `projectPath` for outbound events (SPEC_FULL.md §9
    /// "encoded-directory decoding").
    pub working_dirs: Mutex<HashMap<String, String>>,
    /// `encoded_dir -> in-scope tmux sessions rooted there`, refreshed on
    /// every resolver sweep directly from the tmux probe (not derived from
    /// already-resolved registry entries) — the live candidate list the
    /// path-based ownership fallback and the tailer's in-scope filter both
    /// read from (spec §4.5, §4.1).
    pub live_sessions: Mutex<HashMap<String, Vec<companion_core::SessionName>>>,
    /// Flips to `true` after the first resolver sweep populates
    /// `live_sessions`, so `is_in_scope_dir` can tell "never probed yet"
    /// (don't filter) from "probed and found nothing here" (do filter).
    swept_once: AtomicBool,
}

impl SharedState {
    pub fn new(config: CompanionConfig, now_ms: i64) -> Self {
        let mapping_store_path = config.watched_root.join("companion-session-mappings.json");
        Self {
            registry: Mutex::new(Registry::new(now_ms)),
            mapping_store: Mutex::new(MappingStore::load(mapping_store_path)),
            resolver_state: Mutex::new(ResolverState::default()),
            event_bus: Mutex::new(EventBus::new()),
            contexts: Mutex::new(HashMap::new()),
            working_dirs: Mutex::new(HashMap::new()),
            live_sessions: Mutex::new(HashMap::new()),
            swept_once: AtomicBool::new(false),
            config,
        }
    }

    /// The live, tmux-probed sessions rooted at `encoded_dir` as of the
    /// last resolver sweep.
    pub fn live_sessions_for(&self, encoded_dir: &str) -> Vec<companion_core::SessionName> {
        self.live_sessions.lock().get(encoded_dir).cloned().unwrap_or_default()
    }

    /// Replaces the live-sessions snapshot with the result of a fresh tmux
    /// probe, keyed by `encoded_dir`.
    pub fn replace_live_sessions(&self, sessions: HashMap<String, Vec<companion_core::SessionName>>) {
        *self.live_sessions.lock() = sessions;
        self.swept_once.store(true, Ordering::Release);
    }

    /// Whether any in-scope tmux session is currently rooted at
    /// `encoded_dir` — before the first resolver sweep completes, this is
    /// vacuously true so newly-discovered files aren't dropped on startup.
    pub fn is_in_scope_dir(&self, encoded_dir: &str) -> bool {
        if !self.swept_once.load(Ordering::Acquire) {
            return true;
        }
        self.live_sessions.lock().get(encoded_dir).is_some_and(|sessions| !sessions.is_empty())
    }

    pub fn project_path_for(&self, encoded_dir: &str) -> Option<String> {
        self.working_dirs.lock().get(encoded_dir).cloned()
    }
}
