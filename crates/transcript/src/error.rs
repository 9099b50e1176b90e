// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced at the transcript crate's public boundary.
///
/// Per spec §7, a malformed JSONL line is never an error — it is skipped
/// and the parse continues. This type exists for the read path that hands
/// the parser its bytes, not for parse failures themselves.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to read transcript file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
