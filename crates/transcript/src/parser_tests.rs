// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn jsonl(lines: &[&str]) -> String {
    lines.join("\n")
}

#[test]
fn simple_waiting_turn() {
    let content = jsonl(&[
        r#"{"type":"user","message":{"content":"hi"},"timestamp":"2026-01-30T08:17:00Z"}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"What next?"}]},"timestamp":"2026-01-30T08:17:05Z"}"#,
    ]);

    let timeline = parse_timeline(&content);
    assert_eq!(timeline.message_count(), 2);
    assert!(timeline.last().unwrap().is_assistant());
}

#[test]
fn pending_bash_approval_synthesizes_trio() {
    let content = jsonl(&[
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"b1","name":"Bash","input":{"command":"npm test"}}]},"timestamp":"2026-01-30T08:17:05Z"}"#,
    ]);

    let timeline = parse_timeline(&content);
    let TimelineEntry::Assistant { tool_calls, is_waiting_for_choice, .. } = &timeline.entries[0] else {
        panic!("expected assistant entry");
    };
    assert!(*is_waiting_for_choice);
    assert_eq!(tool_calls[0].status, ToolStatus::Pending);
    let options = tool_calls[0].approval_options.as_ref().unwrap();
    assert_eq!(options.len(), 3);
    assert_eq!(options[0].value, "yes");
}

#[test]
fn matching_tool_result_clears_pending_and_approval() {
    let content = jsonl(&[
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"b1","name":"Bash","input":{"command":"npm test"}}]},"timestamp":"2026-01-30T08:17:05Z"}"#,
        r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"b1","content":"ok","is_error":false}]},"timestamp":"2026-01-30T08:17:10Z"}"#,
    ]);

    let timeline = parse_timeline(&content);
    let TimelineEntry::Assistant { tool_calls, is_waiting_for_choice, .. } = &timeline.entries[0] else {
        panic!("expected assistant entry");
    };
    assert_eq!(tool_calls[0].status, ToolStatus::Completed);
    assert_eq!(tool_calls[0].output.as_deref(), Some("ok"));
    // No pending tools remain on the last assistant entry, so no approval synthesized.
    assert!(!*is_waiting_for_choice);
}

#[test]
fn tool_result_error_flag_sets_error_status() {
    let content = jsonl(&[
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"b1","name":"Bash","input":{}}]},"timestamp":"2026-01-30T08:17:05Z"}"#,
        r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"b1","content":"boom","is_error":true}]},"timestamp":"2026-01-30T08:17:10Z"}"#,
    ]);

    let timeline = parse_timeline(&content);
    let TimelineEntry::Assistant { tool_calls, .. } = &timeline.entries[0] else { panic!() };
    assert_eq!(tool_calls[0].status, ToolStatus::Error);
}

#[test]
fn non_approval_tool_starts_running_not_pending() {
    let content = jsonl(&[
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"r1","name":"Read","input":{"file_path":"/tmp/x"}}]},"timestamp":"2026-01-30T08:17:05Z"}"#,
    ]);

    let timeline = parse_timeline(&content);
    let TimelineEntry::Assistant { tool_calls, is_waiting_for_choice, .. } = &timeline.entries[0] else {
        panic!("expected assistant entry");
    };
    assert_eq!(tool_calls[0].status, ToolStatus::Running);
    assert!(tool_calls[0].approval_options.is_none());
    assert!(!*is_waiting_for_choice);
}

#[test]
fn compaction_form_summary_entry() {
    let content = jsonl(&[r#"{"type":"summary","summary":"condensed history","timestamp":"2026-01-30T08:17:05Z"}"#]);
    let (event, new_last) = detect_compaction(&content, 0);
    let event = event.unwrap();
    assert_eq!(event.summary, "condensed history");
    assert_eq!(new_last, 1);
}

#[test]
fn compaction_form_boundary_then_user_message() {
    let content = jsonl(&[
        r#"{"type":"system","subtype":"compact_boundary","content":"","timestamp":"2026-01-30T08:17:00Z"}"#,
        r#"{"type":"user","message":{"content":"summarized so far"},"timestamp":"2026-01-30T08:17:01Z"}"#,
    ]);
    let (event, _) = detect_compaction(&content, 0);
    assert_eq!(event.unwrap().summary, "summarized so far");
}

#[test]
fn detect_compaction_skips_already_checked_lines() {
    let content = jsonl(&[
        r#"{"type":"summary","summary":"first","timestamp":"2026-01-30T08:17:00Z"}"#,
        r#"{"type":"summary","summary":"second","timestamp":"2026-01-30T08:18:00Z"}"#,
    ]);
    let (event, _) = detect_compaction(&content, 1);
    assert_eq!(event.unwrap().summary, "second");
}

#[test]
fn malformed_line_is_skipped_without_aborting() {
    let content = jsonl(&[
        "not json at all",
        r#"{"type":"user","message":{"content":"hi"},"timestamp":"2026-01-30T08:17:00Z"}"#,
    ]);
    let timeline = parse_timeline(&content);
    assert_eq!(timeline.message_count(), 1);
}

#[test]
fn unknown_type_preserved_as_unknown_variant() {
    let content = jsonl(&[r#"{"type":"future-thing","value":42}"#]);
    let timeline = parse_timeline(&content);
    assert!(matches!(&timeline.entries[0], TimelineEntry::Unknown { .. }));
}

#[test]
fn skill_tool_use_flags_next_user_message() {
    let content = jsonl(&[
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"s1","name":"Skill","input":{"skill":"deploy"}}]},"timestamp":"2026-01-30T08:17:00Z"}"#,
        r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"s1","content":"loaded"}]},"timestamp":"2026-01-30T08:17:01Z"}"#,
        r#"{"type":"user","message":{"content":"expanded skill prompt text"},"timestamp":"2026-01-30T08:17:02Z"}"#,
    ]);
    let timeline = parse_timeline(&content);
    let TimelineEntry::User { skill_name, content, .. } = &timeline.entries[1] else {
        panic!("expected user entry with expanded skill prompt");
    };
    assert_eq!(skill_name.as_deref(), Some("Skill"));
    assert_eq!(content, "expanded skill prompt text");
}

#[test]
fn queue_operation_extracts_summary_tag() {
    let content = jsonl(&[
        r#"{"type":"queue-operation","content":"<task-notification><summary>Build finished</summary></task-notification>","timestamp":"2026-01-30T08:17:00Z"}"#,
    ]);
    let timeline = parse_timeline(&content);
    let TimelineEntry::QueueOperation { content, tool_calls, .. } = &timeline.entries[0] else {
        panic!("expected queue-operation entry");
    };
    assert_eq!(content, "Build finished");
    assert_eq!(tool_calls[0].name, "TaskOutput");
}

#[test]
fn ask_user_question_extracts_options() {
    let content = jsonl(&[
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"q1","name":"AskUserQuestion","input":{"questions":[{"question":"Proceed?","options":[{"label":"Yes","value":"yes"},{"label":"No","value":"no"}]}]}}]},"timestamp":"2026-01-30T08:17:00Z"}"#,
    ]);
    let timeline = parse_timeline(&content);
    let TimelineEntry::Assistant { questions, is_waiting_for_choice, .. } = &timeline.entries[0] else {
        panic!()
    };
    assert!(*is_waiting_for_choice);
    assert_eq!(questions[0].question, "Proceed?");
    assert_eq!(questions[0].options.len(), 2);
}

#[test]
fn reparsing_identical_bytes_is_deterministic() {
    let content = jsonl(&[
        r#"{"type":"user","message":{"content":"hi"},"timestamp":"2026-01-30T08:17:00Z"}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"b1","name":"Bash","input":{"command":"ls"}}]},"timestamp":"2026-01-30T08:17:05Z"}"#,
    ]);
    let a = parse_timeline(&content);
    let b = parse_timeline(&content);
    assert_eq!(a, b);
}
