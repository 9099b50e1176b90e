// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Nothing in the engine is fatal (spec §7, "nothing in the core is
/// fatal"); this exists only for operations with a meaningful failure mode
/// a caller might want to branch on, such as reading a conversation file
/// on demand for `getMessages`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read conversation file {path}: {source}")]
    ReadConversation { path: std::path::PathBuf, source: std::io::Error },
}
