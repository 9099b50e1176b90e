// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use companion_core::{ConversationId, SessionName};

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
fn load_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = MappingStore::load(dir.path().join("companion-session-mappings.json"));
    assert!(store.document().mappings.is_empty());
}

#[test]
fn save_then_load_round_trips_current_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("companion-session-mappings.json");

    let mut store = MappingStore::load(&path);
    store.upsert(mapping("c1", "sess-a", 100));
    store.save().unwrap();

    let reloaded = MappingStore::load(&path);
    let found = reloaded.document().find(&ConversationId::new("c1")).unwrap();
    assert_eq!(found.session_name, "sess-a");
}

#[test]
fn save_rotates_previous_file_into_bak() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("companion-session-mappings.json");

    let mut store = MappingStore::load(&path);
    store.upsert(mapping("c1", "sess-a", 100));
    store.save().unwrap();

    store.upsert(mapping("c1", "sess-b", 200));
    store.save().unwrap();

    assert!(path.with_extension("bak").exists());
}

#[test]
fn legacy_flat_file_loads_as_current_mappings_with_no_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("companion-session-mappings.json");
    std::fs::write(&path, r#"{"sess-a": "conv-1"}"#).unwrap();

    let store = MappingStore::load(&path);
    let found = store.document().find(&ConversationId::new("conv-1")).unwrap();
    assert_eq!(found.session_name, "sess-a");
    assert!(store.document().history.is_empty());
}

#[test]
fn corrupt_file_loads_empty_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("companion-session-mappings.json");
    std::fs::write(&path, "not json at all").unwrap();

    let store = MappingStore::load(&path);
    assert!(store.document().mappings.is_empty());
}

#[test]
fn history_is_persisted_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("companion-session-mappings.json");

    let mut store = MappingStore::load(&path);
    store.upsert(mapping("c1", "sess-a", 100));
    store.upsert(mapping("c1", "sess-a", 200));
    store.save().unwrap();

    let reloaded = MappingStore::load(&path);
    assert_eq!(reloaded.document().mappings.len(), 1);
    assert_eq!(reloaded.document().history.len(), 1);
    assert_eq!(reloaded.document().history[0].conversation_id, ConversationId::new("c1"));
}
