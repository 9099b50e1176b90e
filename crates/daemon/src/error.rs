// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced by the listener and the orchestrator loop.

use thiserror::Error;

/// Errors from handling a single client connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket handshake or I/O error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("wire protocol error: {0}")]
    Wire(#[from] companion_wire::WireError),

    #[error("client did not send Hello as its first message")]
    MissingHello,

    #[error("client provided an invalid or missing auth token")]
    Unauthorized,

    #[error("client disconnected")]
    ConnectionClosed,
}

/// Errors from starting or running the daemon's top-level orchestration.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to watch {path}: {source}")]
    Watch { path: std::path::PathBuf, source: notify::Error },

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: std::net::SocketAddr, source: std::io::Error },
}
