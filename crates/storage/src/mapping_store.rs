// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the conversation-to-session mapping (spec §4.7, §6).
//!
//! On disk the document is keyed by session name — `{"mappings": {session:
//! conversationId}, "history": {session: [conversationId, ...]}}` — which is
//! more compact than the in-memory [`MappingStoreDocument`] but loses the
//! `encoded_dir`/`source`/`mapped_at_ms` detail the resolver tracks at
//! runtime. Loaded history entries are reconstituted with
//! [`MappingSource::History`] and a zero timestamp; the resolver refreshes
//! them the next time it confirms a mapping.

use crate::error::StorageError;
use companion_core::{Mapping, MappingSource, MappingStoreDocument};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

/// Rotate `.bak` / `.bak.2` / `.bak.3`, dropping the oldest once the limit
/// is reached (grounded on the daemon's snapshot backup rotation).
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| if n == 1 { path.with_extension("bak") } else { path.with_extension(format!("bak.{n}")) };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct DiskDocument {
    #[serde(default)]
    mappings: HashMap<String, String>,
    #[serde(default)]
    history: HashMap<String, Vec<String>>,
}

/// Accepts either the current `{"mappings": {...}, "history": {...}}` shape
/// or the legacy flat `{session: conversationId}` shape with no wrapper.
fn parse_disk_document(bytes: &[u8]) -> Result<DiskDocument, StorageError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if value.get("mappings").is_some() || value.get("history").is_some() {
        Ok(serde_json::from_value(value)?)
    } else {
        let flat: HashMap<String, String> = serde_json::from_value(value)?;
        Ok(DiskDocument { mappings: flat, history: HashMap::new() })
    }
}

fn disk_to_memory(disk: DiskDocument) -> MappingStoreDocument {
    let mut doc = MappingStoreDocument::default();
    for (session_name, conversation_id) in disk.mappings {
        doc.mappings.push(Mapping {
            conversation_id: conversation_id.into(),
            session_name: session_name.into(),
            encoded_dir: String::new(),
            source: MappingSource::History,
            mapped_at_ms: 0,
        });
    }
    for (session_name, conversation_ids) in disk.history {
        for conversation_id in conversation_ids {
            doc.history.push(Mapping {
                conversation_id: conversation_id.into(),
                session_name: session_name.clone().into(),
                encoded_dir: String::new(),
                source: MappingSource::History,
                mapped_at_ms: 0,
            });
        }
    }
    doc
}

fn memory_to_disk(doc: &MappingStoreDocument) -> DiskDocument {
    let mappings =
        doc.mappings.iter().map(|m| (m.session_name.to_string(), m.conversation_id.to_string())).collect();

    let mut history: HashMap<String, Vec<String>> = HashMap::new();
    for m in &doc.history {
        history.entry(m.session_name.to_string()).or_default().push(m.conversation_id.to_string());
    }
    DiskDocument { mappings, history }
}

/// Owns the on-disk `companion-session-mappings.json` and the live
/// in-memory mapping document the resolver queries and updates.
pub struct MappingStore {
    path: PathBuf,
    document: MappingStoreDocument,
}

impl MappingStore {
    /// Loads `path` if it exists; a missing or unparseable file starts
    /// empty rather than failing the daemon (spec §4.7 "tolerate a missing
    /// or corrupt store").
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = match fs::read(&path) {
            Ok(bytes) => match parse_disk_document(&bytes) {
                Ok(disk) => disk_to_memory(disk),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "mapping store file is malformed, starting empty");
                    MappingStoreDocument::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => MappingStoreDocument::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read mapping store, starting empty");
                MappingStoreDocument::default()
            }
        };
        Self { path, document }
    }

    pub fn document(&self) -> &MappingStoreDocument {
        &self.document
    }

    pub fn upsert(&mut self, mapping: Mapping) {
        self.document.upsert(mapping);
    }

    /// Replaces the live document wholesale, used after a resolver sweep
    /// mutates its own working copy directly (spec §4.5) rather than going
    /// through [`MappingStore::upsert`] one mapping at a time.
    pub fn replace_document(&mut self, document: MappingStoreDocument) {
        self.document = document;
    }

    /// Writes the document via a temp file plus rename so a crash mid-write
    /// never corrupts the live file, rotating the previous copy into
    /// `.bak`.
    pub fn save(&self) -> Result<(), StorageError> {
        let disk = memory_to_disk(&self.document);
        let bytes = serde_json::to_vec_pretty(&disk)?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &bytes)
            .map_err(|source| StorageError::Write { path: tmp_path.clone(), source })?;

        if self.path.exists() {
            let bak_path = rotate_bak_path(&self.path);
            fs::rename(&self.path, &bak_path).map_err(|source| StorageError::Write { path: bak_path, source })?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|source| StorageError::Write { path: self.path.clone(), source })?;
        Ok(())
    }

    /// Persists the store, logging and swallowing any failure rather than
    /// propagating it — a mapping write failure must never take the daemon
    /// down (spec §7 "best-effort persistence").
    pub fn save_best_effort(&self) {
        if let Err(err) = self.save() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to persist mapping store");
        }
    }
}

#[cfg(test)]
#[path = "mapping_store_tests.rs"]
mod tests;
