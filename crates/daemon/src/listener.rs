// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket listener: accepts connections, enforces the Hello/token
//! handshake, and fans registry events out to subscribed clients.
//!
//! Grounded on the template's `listener/mod.rs::handle_connection` (accept,
//! require an opening handshake message, dispatch by request kind) and
//! `adapters/agent/attach_proxy.rs::bridge_ws` (bidirectional
//! `tokio::select!` loop over a `futures_util::{SinkExt,StreamExt}`
//! WebSocket), adapted from a length-prefixed Unix/TCP protocol and a raw
//! byte proxy to a JSON-text-frame protocol with a typed client/server
//! message envelope.

use companion_adapters::TmuxAdapter;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use companion_wire::{decode_client_message, encode_server_message, ClientMessage, ServerMessage, WireEvent};

use crate::bridge::build_wire_event;
use crate::error::{ConnectionError, DaemonError};
use crate::query::handle_query;
use crate::state::SharedState;

/// Protocol version reported in the `Welcome` message.
pub const PROTOCOL_VERSION: &str = "1";

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

pub async fn run<T: TmuxAdapter>(
    state: Arc<SharedState>,
    tmux: T,
    bind_addr: SocketAddr,
) -> Result<(), DaemonError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| DaemonError::Bind { addr: bind_addr, source })?;
    tracing::info!(addr = %bind_addr, "websocket listener bound");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };
        let state = state.clone();
        let tmux = tmux.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state, tmux).await {
                tracing::debug!(peer = %peer, error = %err, "connection closed");
            }
        });
    }
}

async fn handle_connection<T: TmuxAdapter>(
    stream: TcpStream,
    state: Arc<SharedState>,
    tmux: T,
) -> Result<(), ConnectionError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    let hello = read.next().await.ok_or(ConnectionError::ConnectionClosed)??;
    let Message::Text(text) = hello else { return Err(ConnectionError::MissingHello) };
    let ClientMessage::Hello { token } = decode_client_message(&text)? else {
        return Err(ConnectionError::MissingHello);
    };
    if state.config.auth_token.is_some() && state.config.auth_token != token {
        let err = encode_server_message(&ServerMessage::Error { message: "unauthorized".into() })?;
        write.send(Message::Text(err.into())).await?;
        return Err(ConnectionError::Unauthorized);
    }

    let welcome = encode_server_message(&ServerMessage::Welcome { version: PROTOCOL_VERSION.into() })?;
    write.send(Message::Text(welcome.into())).await?;

    let (client_id, mut handle) = state.event_bus.lock().register();
    let mut subscribed: HashSet<String> = HashSet::new();

    let result = loop {
        tokio::select! {
            incoming = read.next() => {
                let Some(incoming) = incoming else { break Ok(()) };
                let message = incoming?;
                let Message::Text(text) = message else { continue };
                match decode_client_message(&text) {
                    Ok(client_message) => {
                        if let Err(err) = dispatch(client_message, &state, &tmux, &mut subscribed, &mut write).await {
                            break Err(err);
                        }
                    }
                    Err(err) => {
                        let reply = encode_server_message(&ServerMessage::Error { message: err.to_string() })?;
                        write.send(Message::Text(reply.into())).await?;
                    }
                }
            }
            event = handle.recv() => {
                let Some(event) = event else { break Ok(()) };
                if let Some(wire) = build_wire_event(&event, &state) {
                    if should_forward(&wire, &subscribed) {
                        let payload = encode_server_message(&ServerMessage::Event(wire))?;
                        write.send(Message::Text(payload.into())).await?;
                    }
                }
            }
        }
    };

    state.event_bus.lock().unregister(client_id);
    result
}

/// `other-session-activity` always forwards (its purpose is cross-session
/// notification); every other event only forwards to clients subscribed to
/// that session (spec §6 "Outbound events").
fn should_forward(event: &WireEvent, subscribed: &HashSet<String>) -> bool {
    matches!(event, WireEvent::OtherSessionActivity { .. }) || subscribed.contains(event.session_id())
}

async fn dispatch<T: TmuxAdapter>(
    message: ClientMessage,
    state: &Arc<SharedState>,
    tmux: &T,
    subscribed: &mut HashSet<String>,
    write: &mut (impl futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
) -> Result<(), ConnectionError> {
    match message {
        ClientMessage::Hello { .. } => {}
        ClientMessage::Subscribe { session_id } => {
            subscribed.insert(session_id);
        }
        ClientMessage::Unsubscribe { session_id } => {
            subscribed.remove(&session_id);
        }
        ClientMessage::Query { id, query } => {
            let result = handle_query(state, query, now_ms());
            let reply = encode_server_message(&ServerMessage::QueryResult { id, result })?;
            write.send(Message::Text(reply.into())).await?;
        }
        ClientMessage::Inject { session_id, text } => {
            if tmux.send_keys(&session_id, &text).await.is_err() {
                tracing::warn!(session_id = %session_id, "failed to inject keys");
            }
        }
        ClientMessage::MarkNew { session_name } => {
            let _ = handle_query(state, companion_wire::Query::MarkSessionAsNew { session_name }, now_ms());
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
