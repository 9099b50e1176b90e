// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! companion: a minimal query/control client for `companiond`.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod exit_error;

use clap::{Parser, Subcommand};
use companion_wire::{ClientMessage, Query, QueryResult};

use client::DaemonClient;
use exit_error::ExitError;

const DEFAULT_ADDR: &str = "127.0.0.1:7417";

#[derive(Parser)]
#[command(name = "companion", about = "Query and control a running companiond")]
struct Cli {
    /// Address companiond's WebSocket listener is bound to.
    #[arg(long, env = "COMPANION_ADDR", default_value = DEFAULT_ADDR)]
    addr: String,

    /// Auth token, required when companiond was started with one.
    #[arg(long, env = "COMPANION_AUTH_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every tracked, session-mapped conversation.
    ListSessions,
    /// Print a conversation's reconstructed message timeline.
    Messages {
        #[arg(long)]
        session: Option<String>,
    },
    /// Print a conversation's current status.
    Status {
        #[arg(long)]
        session: Option<String>,
    },
    /// Print the conversation-file history for a tmux session.
    Chain {
        #[arg(long)]
        session: String,
    },
    /// Print a one-line-per-session summary across every in-scope session.
    ServerSummary {
        /// Restrict to these tmux session names.
        #[arg(long = "filter")]
        tmux_filter: Vec<String>,
    },
    /// Print the tmux session name owning a conversation id.
    TmuxSession {
        #[arg(long)]
        conversation: String,
    },
    /// Print the tmux session name of the active conversation, if any.
    Active,
    /// Mark a tmux session as the active conversation.
    SetActive {
        #[arg(long)]
        session: String,
    },
    /// Clear the active conversation selection.
    ClearActive,
    /// Register a freshly created tmux session (step 2 of the resolver).
    MarkNew {
        #[arg(long)]
        session: String,
    },
    /// Send keystrokes into the tmux session driving a conversation.
    Inject {
        #[arg(long)]
        session: String,
        text: String,
    },
    /// Subscribe to a session's live events and print them until interrupted.
    Subscribe {
        #[arg(long)]
        session: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let mut client = DaemonClient::connect(&cli.addr, cli.token).await?;

    match cli.command {
        Command::ListSessions => print_result(client.query(Query::ListSessions).await?),
        Command::Messages { session } => {
            print_result(client.query(Query::GetMessages { session_id: session }).await?)
        }
        Command::Status { session } => print_result(client.query(Query::GetStatus { session_id: session }).await?),
        Command::Chain { session } => {
            print_result(client.query(Query::GetConversationChain { session_id: session }).await?)
        }
        Command::ServerSummary { tmux_filter } => {
            let tmux_filter = if tmux_filter.is_empty() { None } else { Some(tmux_filter) };
            print_result(client.query(Query::GetServerSummary { tmux_filter }).await?)
        }
        Command::TmuxSession { conversation } => {
            print_result(client.query(Query::GetTmuxSessionForConversation { conversation_id: conversation }).await?)
        }
        Command::Active => print_result(client.query(Query::GetActiveConversation).await?),
        Command::SetActive { session } => {
            print_result(client.query(Query::SetActiveSession { session_name: session }).await?)
        }
        Command::ClearActive => print_result(client.query(Query::ClearActiveSession).await?),
        Command::MarkNew { session } => {
            print_result(client.query(Query::MarkSessionAsNew { session_name: session }).await?)
        }
        Command::Inject { session, text } => {
            client.send(ClientMessage::Inject { session_id: session, text }).await?;
        }
        Command::Subscribe { session } => {
            client.send(ClientMessage::Subscribe { session_id: session }).await?;
            client.stream_events().await?;
        }
    }

    Ok(())
}

fn print_result(result: QueryResult) {
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("error: failed to format response: {err}"),
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
