// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_addr_when_not_given() {
    let cli = Cli::try_parse_from(["companion", "list-sessions"]).unwrap();
    assert_eq!(cli.addr, DEFAULT_ADDR);
    assert!(cli.token.is_none());
    assert!(matches!(cli.command, Command::ListSessions));
}

#[test]
fn parses_explicit_addr_and_token() {
    let cli = Cli::try_parse_from([
        "companion",
        "--addr",
        "127.0.0.1:9000",
        "--token",
        "secret",
        "active",
    ])
    .unwrap();
    assert_eq!(cli.addr, "127.0.0.1:9000");
    assert_eq!(cli.token.as_deref(), Some("secret"));
    assert!(matches!(cli.command, Command::Active));
}

#[test]
fn parses_messages_with_optional_session() {
    let cli = Cli::try_parse_from(["companion", "messages", "--session", "sess-a"]).unwrap();
    assert!(matches!(cli.command, Command::Messages { session: Some(s) } if s == "sess-a"));

    let cli = Cli::try_parse_from(["companion", "messages"]).unwrap();
    assert!(matches!(cli.command, Command::Messages { session: None }));
}

#[test]
fn parses_chain_requires_session() {
    let cli = Cli::try_parse_from(["companion", "chain", "--session", "sess-a"]).unwrap();
    assert!(matches!(cli.command, Command::Chain { session } if session == "sess-a"));

    assert!(Cli::try_parse_from(["companion", "chain"]).is_err());
}

#[test]
fn parses_server_summary_filter_list() {
    let cli = Cli::try_parse_from([
        "companion",
        "server-summary",
        "--filter",
        "sess-a",
        "--filter",
        "sess-b",
    ])
    .unwrap();
    assert!(matches!(cli.command, Command::ServerSummary { tmux_filter } if tmux_filter == vec!["sess-a", "sess-b"]));
}

#[test]
fn parses_inject_positional_text() {
    let cli = Cli::try_parse_from(["companion", "inject", "--session", "sess-a", "hello world"]).unwrap();
    assert!(matches!(cli.command, Command::Inject { session, text } if session == "sess-a" && text == "hello world"));
}
