// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable configuration (SPEC_FULL.md §4.0.1), resolved the
//! way the template's `crates/daemon/src/env.rs` resolves `state_dir` /
//! `ipc_timeout` / `tcp_port`: explicit env var first, documented default
//! otherwise, no config file parser.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

const DEFAULT_BIND_PORT: u16 = 7417;
const DEFAULT_AGE_FILTER_SECS: u64 = 120;
const DEFAULT_TAGGED_ENV_VAR: &str = "COMPANION_SESSION";
const DEFAULT_TAGGED_ENV_VALUE: &str = "1";
const DEFAULT_PROMPT_CHAR: char = '❯';

#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Root directory recursively watched for `*.jsonl` conversation logs.
    pub watched_root: PathBuf,
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,
    /// When set, every connection's Hello must carry a matching token.
    pub auth_token: Option<String>,
    /// Age filter for the tailer's initial directory scan (spec §4.1).
    pub age_filter_secs: u64,
    /// Sentinel tmux environment variable marking an in-scope session.
    pub tagged_env_var: String,
    /// Required value of `tagged_env_var` for a session to be in scope.
    pub tagged_env_value: String,
    /// Prompt character stripped from scrollback lines by resolver
    /// strategy 4 (spec.md §9, resolved in SPEC_FULL.md §9).
    pub prompt_char: char,
    /// File to append logs to, in addition to stderr. `None` logs to
    /// stderr only.
    pub log_path: Option<PathBuf>,
}

impl CompanionConfig {
    pub fn from_env() -> Self {
        Self {
            watched_root: watched_root(),
            bind_addr: bind_addr(),
            auth_token: auth_token(),
            age_filter_secs: env_u64("COMPANION_AGE_FILTER_SECS", DEFAULT_AGE_FILTER_SECS),
            tagged_env_var: std::env::var("COMPANION_TAGGED_ENV_VAR")
                .unwrap_or_else(|_| DEFAULT_TAGGED_ENV_VAR.to_string()),
            tagged_env_value: std::env::var("COMPANION_TAGGED_ENV_VALUE")
                .unwrap_or_else(|_| DEFAULT_TAGGED_ENV_VALUE.to_string()),
            prompt_char: std::env::var("COMPANION_PROMPT_CHAR")
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(DEFAULT_PROMPT_CHAR),
            log_path: std::env::var("COMPANION_LOG_PATH").ok().map(PathBuf::from),
        }
    }
}

fn watched_root() -> PathBuf {
    if let Ok(dir) = std::env::var("COMPANION_WATCH_ROOT") {
        return PathBuf::from(dir);
    }
    dirs_home().join(".claude/projects")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

fn bind_addr() -> SocketAddr {
    std::env::var("COMPANION_BIND_ADDR").ok().and_then(|s| s.parse().ok()).unwrap_or_else(|| {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_BIND_PORT))
    })
}

fn auth_token() -> Option<String> {
    std::env::var("COMPANION_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

fn env_u64(var: &str, default: u64) -> u64 {
    std::env::var(var).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
