// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[test]
fn path_contains_subagents_detects_the_segment() {
    assert!(path_contains_subagents(Path::new("/root/proj/subagents/abc.jsonl")));
    assert!(!path_contains_subagents(Path::new("/root/proj/abc.jsonl")));
}

#[test]
fn conversation_id_for_path_uses_file_stem() {
    let id = conversation_id_for_path(Path::new("/x/y/conv-123.jsonl")).unwrap();
    assert_eq!(id, ConversationId::new("conv-123"));
    assert!(conversation_id_for_path(Path::new("/x/y/not-jsonl.txt")).is_none());
}

#[test]
fn is_stale_compares_against_threshold() {
    let now = SystemTime::now();
    let recent = now - StdDuration::from_secs(10);
    let old = now - StdDuration::from_secs(200);
    assert!(!is_stale(recent, now, AGE_FILTER));
    assert!(is_stale(old, now, AGE_FILTER));
}

#[tokio::test]
async fn run_emits_debounced_event_for_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let tailer = FileTailer::watch(dir.path()).unwrap();
    let (tx, mut rx) = mpsc::channel(16);

    tokio::spawn(tailer.run(|_| false, |_| true, tx));

    let file_path = dir.path().join("conv-a.jsonl");
    std::fs::write(&file_path, "{}\n").unwrap();

    let event = tokio::time::timeout(StdDuration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.conversation_id, ConversationId::new("conv-a"));
    assert_eq!(event.path, file_path);
}

#[tokio::test]
async fn run_skips_subagents_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("subagents")).unwrap();
    let tailer = FileTailer::watch(dir.path()).unwrap();
    let (tx, mut rx) = mpsc::channel(16);

    tokio::spawn(tailer.run(|_| false, |_| true, tx));

    std::fs::write(dir.path().join("subagents/conv-b.jsonl"), "{}\n").unwrap();
    // A normal file afterward should still come through, proving the
    // subagents write was the one that got skipped rather than everything.
    let visible_path = dir.path().join("conv-c.jsonl");
    std::fs::write(&visible_path, "{}\n").unwrap();

    let event = tokio::time::timeout(StdDuration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.conversation_id, ConversationId::new("conv-c"));
}

#[tokio::test]
async fn run_applies_age_filter_to_unknown_conversations() {
    let dir = tempfile::tempdir().unwrap();
    let old_path = dir.path().join("conv-old.jsonl");
    std::fs::write(&old_path, "{}\n").unwrap();
    let old_time = filetime_minus(StdDuration::from_secs(300));
    filetime_set(&old_path, old_time);

    let known: Arc<std::sync::atomic::AtomicBool> = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let tailer = FileTailer::watch(dir.path()).unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let known_clone = known.clone();
    tokio::spawn(tailer.run(move |_| known_clone.load(std::sync::atomic::Ordering::SeqCst), |_| true, tx));

    // touch the old file again (a modify event) — should be filtered since
    // it's not yet known and its mtime is stale.
    std::fs::write(&old_path, "{}\nmore\n").unwrap();
    filetime_set(&old_path, old_time);

    let fresh_path = dir.path().join("conv-fresh.jsonl");
    std::fs::write(&fresh_path, "{}\n").unwrap();

    let event = tokio::time::timeout(StdDuration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.conversation_id, ConversationId::new("conv-fresh"));
}

#[tokio::test]
async fn run_skips_unknown_files_outside_in_scope_directories() {
    let dir = tempfile::tempdir().unwrap();
    let out_of_scope_dir = dir.path().join("-proj-gone");
    std::fs::create_dir(&out_of_scope_dir).unwrap();
    let tailer = FileTailer::watch(dir.path()).unwrap();
    let (tx, mut rx) = mpsc::channel(16);

    tokio::spawn(tailer.run(|_| false, |encoded_dir| encoded_dir != "-proj-gone", tx));

    std::fs::write(out_of_scope_dir.join("conv-stale.jsonl"), "{}\n").unwrap();
    // A file in an in-scope directory afterward should still come through,
    // proving the out-of-scope write was the one that got skipped.
    let visible_path = dir.path().join("conv-visible.jsonl");
    std::fs::write(&visible_path, "{}\n").unwrap();

    let event = tokio::time::timeout(StdDuration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.conversation_id, ConversationId::new("conv-visible"));
}

fn filetime_minus(duration: StdDuration) -> SystemTime {
    SystemTime::now() - duration
}

/// Sets both atime and mtime on a file without pulling in a crate just for
/// this test — shells out to `touch -d`.
fn filetime_set(path: &Path, time: SystemTime) {
    let secs = time.duration_since(std::time::UNIX_EPOCH).unwrap().as_secs();
    let stamp = format!("@{secs}");
    let status = std::process::Command::new("touch").arg("-d").arg(&stamp).arg(path).status().unwrap();
    assert!(status.success());
}
