// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::CompanionConfig;
use crate::state::{ConversationContext, SharedState};
use std::path::PathBuf;

fn test_config(watched_root: PathBuf) -> CompanionConfig {
    CompanionConfig {
        watched_root,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token: None,
        age_filter_secs: 120,
        tagged_env_var: "COMPANION_SESSION".into(),
        tagged_env_value: "1".into(),
        prompt_char: '\u{276f}',
        log_path: None,
    }
}

#[test]
fn last_message_text_reads_content_from_every_textual_variant() {
    let entry = companion_core::TimelineEntry::User { content: "hi".into(), timestamp_ms: 1, skill_name: None };
    assert_eq!(last_message_text(&entry), "hi");

    let unknown = companion_core::TimelineEntry::Unknown { raw: serde_json::json!({}) };
    assert_eq!(last_message_text(&unknown), "");
}

#[test]
fn dir_owners_for_returns_the_live_tmux_probed_sessions_for_the_dir() {
    let state = Arc::new(SharedState::new(test_config(PathBuf::from("/tmp/companion-orch-test")), -10_000));
    let mut live_sessions = std::collections::HashMap::new();
    live_sessions.insert("-proj-a".to_string(), vec![SessionName::new("sess-a")]);
    live_sessions.insert("-proj-b".to_string(), vec![SessionName::new("sess-b")]);
    state.replace_live_sessions(live_sessions);

    let owners = dir_owners_for(&state, "-proj-a");
    assert_eq!(owners, vec![SessionName::new("sess-a")]);
}

#[test]
fn dir_owners_for_sees_a_session_with_no_tracked_conversation_yet() {
    // Two tmux sessions A/B share a directory; A already owns a tracked
    // conversation but B has none yet. A brand-new file in that directory
    // must still see both as candidates, not just the pre-existing owner.
    let state = Arc::new(SharedState::new(test_config(PathBuf::from("/tmp/companion-orch-test")), -10_000));
    let dir_owners = [SessionName::new("sess-a")];
    state.registry.lock().apply_pass(
        &ConversationId::new("c1"),
        "",
        20_000,
        &companion_core::MappingStoreDocument::default(),
        &dir_owners,
    );
    state.contexts.lock().insert(
        ConversationId::new("c1"),
        ConversationContext {
            path: PathBuf::from("/tmp/c1.jsonl"),
            encoded_dir: "-proj-shared".into(),
            last_message: None,
            source_mtime_ms: 0,
        },
    );

    let mut live_sessions = std::collections::HashMap::new();
    live_sessions.insert("-proj-shared".to_string(), vec![SessionName::new("sess-a"), SessionName::new("sess-b")]);
    state.replace_live_sessions(live_sessions);

    let owners = dir_owners_for(&state, "-proj-shared");
    assert_eq!(owners.len(), 2);
    assert!(owners.contains(&SessionName::new("sess-a")));
    assert!(owners.contains(&SessionName::new("sess-b")));
}

#[test]
fn evict_out_of_scope_conversations_drops_conversations_whose_dir_has_no_live_session() {
    let state = Arc::new(SharedState::new(test_config(PathBuf::from("/tmp/companion-orch-test")), -10_000));
    let dir_owners = [SessionName::new("sess-a")];
    state.registry.lock().apply_pass(
        &ConversationId::new("c1"),
        "",
        20_000,
        &companion_core::MappingStoreDocument::default(),
        &dir_owners,
    );
    state.contexts.lock().insert(
        ConversationId::new("c1"),
        ConversationContext { path: PathBuf::from("/tmp/c1.jsonl"), encoded_dir: "-proj-gone".into(), last_message: None, source_mtime_ms: 0 },
    );

    // A sweep completes and finds nothing rooted at "-proj-gone" anymore.
    let mut live_sessions = std::collections::HashMap::new();
    live_sessions.insert("-proj-still-here".to_string(), vec![SessionName::new("sess-b")]);
    state.replace_live_sessions(live_sessions);

    evict_out_of_scope_conversations(&state);

    assert!(state.registry.lock().entry(&ConversationId::new("c1")).is_none());
    assert!(!state.contexts.lock().contains_key(&ConversationId::new("c1")));
}

#[test]
fn evict_out_of_scope_conversations_is_a_no_op_before_the_first_sweep() {
    let state = Arc::new(SharedState::new(test_config(PathBuf::from("/tmp/companion-orch-test")), -10_000));
    let dir_owners = [SessionName::new("sess-a")];
    state.registry.lock().apply_pass(
        &ConversationId::new("c1"),
        "",
        20_000,
        &companion_core::MappingStoreDocument::default(),
        &dir_owners,
    );
    state.contexts.lock().insert(
        ConversationId::new("c1"),
        ConversationContext { path: PathBuf::from("/tmp/c1.jsonl"), encoded_dir: "-proj-gone".into(), last_message: None, source_mtime_ms: 0 },
    );

    evict_out_of_scope_conversations(&state);

    assert!(state.registry.lock().entry(&ConversationId::new("c1")).is_some());
}

#[test]
fn decoded_working_dir_falls_back_to_the_encoded_string_when_undecodable() {
    let encoded = "not-a-real-encoded-dir";
    assert_eq!(decoded_working_dir(encoded), encoded);
}

#[test]
fn decoded_working_dir_decodes_a_path_that_exists_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().to_str().expect("utf8 path").to_string();
    let encoded = encode_dir(&path);
    assert_eq!(decoded_working_dir(&encoded), path);
}

#[test]
fn now_ms_and_epoch_ms_agree_on_the_unix_epoch() {
    assert_eq!(epoch_ms(std::time::UNIX_EPOCH), 0);
    assert!(now_ms() > 0);
}

#[test]
fn scan_conversations_finds_jsonl_files_and_skips_subagents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let encoded_dir = dir.path().join("-home-user-proj");
    std::fs::create_dir_all(&encoded_dir).expect("mkdir");
    std::fs::write(encoded_dir.join("abc123.jsonl"), "{}").expect("write");

    let subagents_dir = encoded_dir.join("subagents");
    std::fs::create_dir_all(&subagents_dir).expect("mkdir");
    std::fs::write(subagents_dir.join("sub1.jsonl"), "{}").expect("write");

    let files = scan_conversations(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].encoded_dir, "-home-user-proj");
    assert_eq!(files[0].conversation_id, ConversationId::new("abc123"));
}
