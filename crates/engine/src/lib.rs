// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! companion-engine: the daemon's running core. Ties together the file
//! tailer, the conversation↔session resolver, the session registry, and
//! the client-facing event bus (spec §4).

mod error;
pub mod event_bus;
pub mod registry;
pub mod resolver;
pub mod tailer;

pub use error::EngineError;
pub use event_bus::{ClientHandle, ClientId, EventBus};
pub use registry::{PassOutcome, Registry, INITIAL_LOAD_WINDOW_MS, WAITING_CONFIRMATION_MS};
pub use resolver::{ConversationFile, InScopeSession, Resolver, ResolverState};
pub use tailer::{FileTailer, TailEvent, AGE_FILTER, DEBOUNCE_WINDOW};
