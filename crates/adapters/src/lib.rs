// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! companion-adapters: the `TmuxAdapter` abstraction over the tmux CLI.

pub mod tmux;

pub use tmux::{RealTmuxAdapter, TmuxAdapter, TmuxError, DEFAULT_SCROLLBACK_LINES};

#[cfg(any(test, feature = "test-support"))]
pub use tmux::{FakeSession, FakeTmuxAdapter};
