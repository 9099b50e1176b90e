// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The conversation-to-session mapping model persisted by the Mapping Store
//! (spec §3 "Mapping", §4.7).

use crate::ids::{ConversationId, SessionName};
use serde::{Deserialize, Serialize};

/// Why a mapping between a conversation and a tmux session was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    /// Matched by `workingDir` against a unique tagged session.
    WorkingDir,
    /// Matched by reading the sentinel env var from the pane's process.
    EnvVar,
    /// Matched by pane PID ancestry.
    PanePid,
    /// Matched by scanning pane scrollback for the prompt line.
    Scrollback,
    /// Only one tagged session existed; assigned by elimination.
    SoleCandidate,
    /// Re-pointed at a new conversation after a detected compaction, the
    /// old mapping retired into history.
    CompactionRemap,
    /// Carried over from a prior mapping for the same encoded directory.
    History,
}

crate::simple_display! {
    MappingSource {
        WorkingDir => "working_dir",
        EnvVar => "env_var",
        PanePid => "pane_pid",
        Scrollback => "scrollback",
        SoleCandidate => "sole_candidate",
        CompactionRemap => "compaction_remap",
        History => "history",
    }
}

/// The live binding from one conversation to the tmux session driving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub conversation_id: ConversationId,
    pub session_name: SessionName,
    pub encoded_dir: String,
    pub source: MappingSource,
    pub mapped_at_ms: i64,
}

/// The full persisted document: the current mapping per conversation plus a
/// history kept for reconnection after a session is killed and recreated.
///
/// Deserialization accepts the legacy flat format (a bare map of
/// conversation id to session name) in addition to the current shape
/// (spec §4.7 "legacy flat format").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingStoreDocument {
    pub mappings: Vec<Mapping>,
    #[serde(default)]
    pub history: Vec<Mapping>,
}

impl MappingStoreDocument {
    pub fn find(&self, conversation_id: &ConversationId) -> Option<&Mapping> {
        self.mappings.iter().find(|m| &m.conversation_id == conversation_id)
    }

    /// Insert or replace the mapping for a conversation, moving any
    /// superseded mapping for the same conversation into history.
    pub fn upsert(&mut self, mapping: Mapping) {
        if let Some(idx) = self.mappings.iter().position(|m| m.conversation_id == mapping.conversation_id) {
            let old = self.mappings.remove(idx);
            self.history.push(old);
        }
        self.mappings.push(mapping);
    }

    /// Most recent history entry whose `encoded_dir` matches, used by the
    /// `History` resolver strategy (spec §4.5 step 6).
    pub fn most_recent_for_dir(&self, encoded_dir: &str) -> Option<&Mapping> {
        self.history
            .iter()
            .filter(|m| m.encoded_dir == encoded_dir)
            .max_by_key(|m| m.mapped_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(conv: &str, session: &str, at: i64) -> Mapping {
        Mapping {
            conversation_id: ConversationId::new(conv),
            session_name: SessionName::new(session),
            encoded_dir: "-Users-jon-proj".into(),
            source: MappingSource::WorkingDir,
            mapped_at_ms: at,
        }
    }

    #[test]
    fn upsert_moves_prior_mapping_to_history() {
        let mut doc = MappingStoreDocument::default();
        doc.upsert(mapping("c1", "sess-a", 100));
        doc.upsert(mapping("c1", "sess-b", 200));

        assert_eq!(doc.mappings.len(), 1);
        assert_eq!(doc.find(&ConversationId::new("c1")).unwrap().session_name, "sess-b");
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.history[0].session_name, "sess-a");
    }

    #[test]
    fn most_recent_for_dir_picks_latest_timestamp() {
        let mut doc = MappingStoreDocument::default();
        doc.history.push(mapping("c1", "sess-a", 100));
        doc.history.push(mapping("c2", "sess-b", 300));
        doc.history.push(mapping("c3", "sess-c", 200));

        let found = doc.most_recent_for_dir("-Users-jon-proj").unwrap();
        assert_eq!(found.session_name, "sess-b");
    }

    #[test]
    fn legacy_flat_format_deserializes_with_empty_history() {
        let json = serde_json::json!({
            "mappings": [{
                "conversation_id": "c1",
                "session_name": "sess-a",
                "encoded_dir": "-Users-jon-proj",
                "source": "working_dir",
                "mapped_at_ms": 100,
            }]
        });
        let doc: MappingStoreDocument = serde_json::from_value(json).unwrap();
        assert!(doc.history.is_empty());
        assert_eq!(doc.mappings.len(), 1);
    }
}
