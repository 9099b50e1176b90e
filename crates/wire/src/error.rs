// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors decoding a WebSocket text frame into a [`crate::ClientMessage`]
/// or [`crate::ServerMessage`].
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
}
