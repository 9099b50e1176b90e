// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client/server envelopes exchanged as JSON text frames over the
//! WebSocket (spec §6, SPEC_FULL.md §6 "Wire transport").
//!
//! Unlike the template's length-delimited framing (`crates/daemon` wire
//! format: 4-byte length prefix + JSON), a WebSocket frame already carries
//! its own boundary, so each message here is exactly one text frame's
//! worth of JSON — no length prefix needed.

use crate::error::WireError;
use crate::event::WireEvent;
use crate::query::{Query, QueryResult};
use serde::{Deserialize, Serialize};

/// Messages a connected client may send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Must be the first message on every connection (SPEC_FULL.md §6
    /// "Auth handshake").
    Hello {
        #[serde(default)]
        token: Option<String>,
    },
    Subscribe {
        session_id: String,
    },
    Unsubscribe {
        session_id: String,
    },
    Query {
        id: u64,
        query: Query,
    },
    /// Sends keystrokes into the tmux session driving a conversation.
    Inject {
        session_id: String,
        text: String,
    },
    MarkNew {
        session_name: String,
    },
}

/// Messages the daemon sends back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Welcome {
        version: String,
    },
    Event(WireEvent),
    QueryResult {
        id: u64,
        result: QueryResult,
    },
    Error {
        message: String,
    },
}

pub fn encode_client_message(message: &ClientMessage) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode_client_message(text: &str) -> Result<ClientMessage, WireError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_server_message(message: &ServerMessage) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, WireError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
