// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn status_change_serializes_with_camel_case_fields() {
    let event = WireEvent::StatusChange {
        session_id: "sess-a".into(),
        is_waiting_for_input: true,
        current_activity: Some("Bash".into()),
        last_message: None,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "status-change");
    assert_eq!(json["sessionId"], "sess-a");
    assert_eq!(json["isWaitingForInput"], true);
    assert_eq!(json["currentActivity"], "Bash");
}

#[test]
fn pending_approval_nests_tool_list() {
    let event = WireEvent::PendingApproval {
        session_id: "sess-a".into(),
        project_path: "/tmp/proj".into(),
        tools: vec![PendingApprovalTool { name: "Bash".into(), id: "t1".into() }],
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["projectPath"], "/tmp/proj");
    assert_eq!(json["tools"][0]["name"], "Bash");
}

#[test]
fn session_id_accessor_covers_every_variant() {
    let event = WireEvent::SessionCompleted {
        session_id: "sess-a".into(),
        project_path: "/tmp".into(),
        session_name: "sess-a".into(),
        content: "done".into(),
    };
    assert_eq!(event.session_id(), "sess-a");
}
