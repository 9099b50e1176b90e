// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed table of known tool names: which ones gate on approval, and
//! how to render a one-line activity label for each (spec §4.3, §6).

/// Tools that require explicit user approval before they run. `Task` is a
/// member of this set but is excluded from approval synthesis (spec §4.2).
pub const APPROVAL_TOOLS: &[&str] = &["Bash", "Write", "Edit", "Task", "NotebookEdit", "EnterPlanMode"];

/// Tools that signal waiting via an interactive choice rather than a yes/no
/// approval gate.
pub const INTERACTIVE_TOOLS: &[&str] = &["AskUserQuestion", "ExitPlanMode"];

pub fn is_approval_tool(name: &str) -> bool {
    APPROVAL_TOOLS.contains(&name)
}

pub fn is_interactive_tool(name: &str) -> bool {
    INTERACTIVE_TOOLS.contains(&name)
}

/// Tools that require approval and are eligible for synthesis of the
/// standard yes/no/always trio — everything in [`APPROVAL_TOOLS`] except
/// `Task`, which runs as a sub-agent without a direct approval prompt.
pub fn synthesizes_approval_options(name: &str) -> bool {
    is_approval_tool(name) && name != "Task"
}

/// A short, human-readable label for the activity a tool name represents,
/// used as the base of `currentActivity` (spec §4.3).
pub fn activity_label(name: &str) -> &'static str {
    match name {
        "Bash" => "Running command",
        "Write" => "Writing file",
        "Edit" => "Editing file",
        "NotebookEdit" => "Editing notebook",
        "Read" => "Reading file",
        "Grep" => "Searching",
        "Glob" => "Finding files",
        "Task" => "Running sub-agent",
        "EnterPlanMode" => "Entering plan mode",
        "ExitPlanMode" => "Awaiting plan approval",
        "AskUserQuestion" => "Awaiting answer",
        "WebFetch" => "Fetching URL",
        "WebSearch" => "Searching the web",
        "TaskOutput" => "Queue operation",
        _ => "Working",
    }
}

/// Truncate a free-form parameter value to a short summary appended to the
/// activity label (spec §4.3: "file basename, truncated command ≤ 40
/// chars, pattern").
pub fn param_summary(name: &str, input: &serde_json::Value) -> Option<String> {
    const MAX_COMMAND_LEN: usize = 40;
    let field = |key: &str| input.get(key).and_then(|v| v.as_str());
    match name {
        "Bash" => field("command").map(|cmd| truncate(cmd, MAX_COMMAND_LEN)),
        "Write" | "Edit" | "Read" => field("file_path").map(basename),
        "NotebookEdit" => field("notebook_path").map(basename),
        "Grep" | "Glob" => field("pattern").map(|p| p.to_string()),
        "WebFetch" | "WebSearch" => field("url").or_else(|| field("query")).map(|s| s.to_string()),
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn basename(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_tools_exclude_task_from_synthesis() {
        assert!(is_approval_tool("Task"));
        assert!(!synthesizes_approval_options("Task"));
        assert!(synthesizes_approval_options("Bash"));
    }

    #[test]
    fn interactive_tools_are_not_approval_tools() {
        assert!(!is_approval_tool("AskUserQuestion"));
        assert!(is_interactive_tool("ExitPlanMode"));
    }

    #[test]
    fn param_summary_truncates_long_bash_command() {
        let input = serde_json::json!({"command": "a".repeat(100)});
        let summary = param_summary("Bash", &input).unwrap();
        assert_eq!(summary.chars().count(), 40);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn param_summary_extracts_basename() {
        let input = serde_json::json!({"file_path": "/src/main.rs"});
        assert_eq!(param_summary("Write", &input).unwrap(), "main.rs");
    }
}
