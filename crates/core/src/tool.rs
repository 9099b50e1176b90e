// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-call data carried on assistant timeline entries.

use crate::ids::ToolCallId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a single tool invocation.
///
/// Invariant: `Completed | Error` implies a matching tool-result entry was
/// found later in the JSONL sequence; `Pending` means none has arrived yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

crate::simple_display! {
    ToolStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Error => "error",
    }
}

impl ToolStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Error)
    }
}

/// An option offered to the user for an approval-gated tool call, or for an
/// interactive question (`AskUserQuestion`, `ExitPlanMode`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOption {
    pub label: String,
    pub value: String,
}

impl ApprovalOption {
    /// The standard yes/no/always trio synthesized for pending
    /// approval-required tools (spec §4.2 "Approval synthesis").
    pub fn standard_trio() -> Vec<Self> {
        vec![
            ApprovalOption { label: "Yes".into(), value: "yes".into() },
            ApprovalOption { label: "No".into(), value: "no".into() },
            ApprovalOption { label: "Always".into(), value: "always".into() },
        ]
    }
}

/// A single tool-use block paired (if possible) with its tool-result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub name: String,
    /// Free-form input map as recorded in the `tool_use` block.
    pub input: serde_json::Value,
    pub status: ToolStatus,
    pub output: Option<String>,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    /// Present only for pending approval/interactive tools on the last
    /// assistant entry (spec §4.2 "Approval synthesis").
    #[serde(default)]
    pub approval_options: Option<Vec<ApprovalOption>>,
}

impl ToolCall {
    pub fn new(id: impl Into<ToolCallId>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            status: ToolStatus::Pending,
            output: None,
            started_at_ms: None,
            completed_at_ms: None,
            approval_options: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ToolStatus::Pending
    }
}

/// One interactive question surfaced by `AskUserQuestion` / `ExitPlanMode`.
///
/// When a tool input carries more than one question, the first is the
/// primary (surfaced in `currentActivity`); all are preserved in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub question: String,
    pub options: Vec<ApprovalOption>,
}
