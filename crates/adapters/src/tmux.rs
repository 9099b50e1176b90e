// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shells out to `tmux` for everything the resolver and registry need to
//! know about sessions (spec §4.4 "Tmux Probe").

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from tmux probe operations. All are tolerated by callers — a
/// session vanishing between enumeration and read is not an error (spec
/// §4.4).
#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux call timed out")]
    Timeout,
    #[error("tmux exited with failure: {0}")]
    CommandFailed(String),
    #[error("failed to spawn tmux: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("tmux output was not valid utf-8")]
    InvalidUtf8,
}

/// Abstraction over the tmux CLI, so the resolver and registry can be
/// tested without a real terminal multiplexer.
#[async_trait]
pub trait TmuxAdapter: Clone + Send + Sync + 'static {
    /// All session names currently known to tmux, tagged or not.
    async fn list_sessions(&self) -> Result<Vec<String>, TmuxError>;

    /// Read an environment variable from a session. `Ok(None)` means the
    /// variable is unset, not that the session is missing.
    async fn session_env(&self, session: &str, var: &str) -> Result<Option<String>, TmuxError>;

    /// The working directory of the session's active pane.
    async fn working_dir(&self, session: &str) -> Result<String, TmuxError>;

    /// The PID of the session's active pane process.
    async fn pane_pid(&self, session: &str) -> Result<i32, TmuxError>;

    /// Up to `lines` lines of scrollback from the session's active pane,
    /// most recent last.
    async fn capture_scrollback(&self, session: &str, lines: usize) -> Result<String, TmuxError>;

    /// Type `text` into the session followed by Enter.
    async fn send_keys(&self, session: &str, text: &str) -> Result<(), TmuxError>;

    async fn new_session(&self, session: &str, working_dir: &str) -> Result<(), TmuxError>;

    async fn kill_session(&self, session: &str) -> Result<(), TmuxError>;
}

/// Default scrollback depth for resolver strategy 2 (spec §4.4, bullet 5).
pub const DEFAULT_SCROLLBACK_LINES: usize = 500;

/// `tmux`-backed implementation. Every call is bounded by `timeout` so a
/// hung subprocess never blocks the resolver's periodic sweep.
#[derive(Debug, Clone)]
pub struct RealTmuxAdapter {
    timeout: Duration,
}

impl Default for RealTmuxAdapter {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(2) }
    }
}

impl RealTmuxAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let output = tokio::time::timeout(self.timeout, tokio::process::Command::new("tmux").args(args).output())
            .await
            .map_err(|_| TmuxError::Timeout)??;

        if !output.status.success() {
            return Err(TmuxError::CommandFailed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        String::from_utf8(output.stdout).map_err(|_| TmuxError::InvalidUtf8)
    }
}

#[async_trait]
impl TmuxAdapter for RealTmuxAdapter {
    async fn list_sessions(&self) -> Result<Vec<String>, TmuxError> {
        match self.run(&["list-sessions", "-F", "#{session_name}"]).await {
            Ok(stdout) => Ok(stdout.lines().map(str::to_string).collect()),
            // No server running means no sessions, not a real failure.
            Err(TmuxError::CommandFailed(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn session_env(&self, session: &str, var: &str) -> Result<Option<String>, TmuxError> {
        match self.run(&["show-environment", "-t", session, var]).await {
            Ok(stdout) => Ok(stdout.trim().strip_prefix(&format!("{var}=")).map(str::to_string)),
            Err(TmuxError::CommandFailed(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn working_dir(&self, session: &str) -> Result<String, TmuxError> {
        let out = self.run(&["display-message", "-p", "-t", session, "#{pane_current_path}"]).await?;
        Ok(out.trim().to_string())
    }

    async fn pane_pid(&self, session: &str) -> Result<i32, TmuxError> {
        let out = self.run(&["display-message", "-p", "-t", session, "#{pane_pid}"]).await?;
        out.trim().parse().map_err(|_| TmuxError::InvalidUtf8)
    }

    async fn capture_scrollback(&self, session: &str, lines: usize) -> Result<String, TmuxError> {
        let start = format!("-{lines}");
        self.run(&["capture-pane", "-t", session, "-p", "-S", &start]).await
    }

    async fn send_keys(&self, session: &str, text: &str) -> Result<(), TmuxError> {
        self.run(&["send-keys", "-t", session, text, "Enter"]).await.map(drop)
    }

    async fn new_session(&self, session: &str, working_dir: &str) -> Result<(), TmuxError> {
        self.run(&["new-session", "-d", "-s", session, "-c", working_dir]).await.map(drop)
    }

    async fn kill_session(&self, session: &str) -> Result<(), TmuxError> {
        self.run(&["kill-session", "-t", session]).await.map(drop)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{async_trait, TmuxAdapter, TmuxError};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default)]
    pub struct FakeSession {
        pub working_dir: String,
        pub env: HashMap<String, String>,
        pub pane_pid: i32,
        pub scrollback: String,
    }

    #[derive(Default)]
    struct FakeState {
        sessions: HashMap<String, FakeSession>,
        sent_keys: Vec<(String, String)>,
        killed: Vec<String>,
    }

    /// Scripted tmux adapter for deterministic tests — no real terminal
    /// multiplexer required (spec §9 "ambient child_process calls").
    #[derive(Clone, Default)]
    pub struct FakeTmuxAdapter {
        inner: Arc<Mutex<FakeState>>,
    }

    impl FakeTmuxAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_session(&self, name: &str, session: FakeSession) {
            self.inner.lock().sessions.insert(name.to_string(), session);
        }

        pub fn remove_session(&self, name: &str) {
            self.inner.lock().sessions.remove(name);
        }

        pub fn sent_keys(&self) -> Vec<(String, String)> {
            self.inner.lock().sent_keys.clone()
        }

        pub fn killed_sessions(&self) -> Vec<String> {
            self.inner.lock().killed.clone()
        }
    }

    #[async_trait]
    impl TmuxAdapter for FakeTmuxAdapter {
        async fn list_sessions(&self) -> Result<Vec<String>, TmuxError> {
            Ok(self.inner.lock().sessions.keys().cloned().collect())
        }

        async fn session_env(&self, session: &str, var: &str) -> Result<Option<String>, TmuxError> {
            Ok(self.inner.lock().sessions.get(session).and_then(|s| s.env.get(var).cloned()))
        }

        async fn working_dir(&self, session: &str) -> Result<String, TmuxError> {
            self.inner
                .lock()
                .sessions
                .get(session)
                .map(|s| s.working_dir.clone())
                .ok_or_else(|| TmuxError::CommandFailed("no such session".into()))
        }

        async fn pane_pid(&self, session: &str) -> Result<i32, TmuxError> {
            self.inner
                .lock()
                .sessions
                .get(session)
                .map(|s| s.pane_pid)
                .ok_or_else(|| TmuxError::CommandFailed("no such session".into()))
        }

        async fn capture_scrollback(&self, session: &str, _lines: usize) -> Result<String, TmuxError> {
            self.inner
                .lock()
                .sessions
                .get(session)
                .map(|s| s.scrollback.clone())
                .ok_or_else(|| TmuxError::CommandFailed("no such session".into()))
        }

        async fn send_keys(&self, session: &str, text: &str) -> Result<(), TmuxError> {
            self.inner.lock().sent_keys.push((session.to_string(), text.to_string()));
            Ok(())
        }

        async fn new_session(&self, session: &str, working_dir: &str) -> Result<(), TmuxError> {
            self.inner.lock().sessions.insert(
                session.to_string(),
                FakeSession { working_dir: working_dir.to_string(), ..Default::default() },
            );
            Ok(())
        }

        async fn kill_session(&self, session: &str) -> Result<(), TmuxError> {
            self.inner.lock().sessions.remove(session);
            self.inner.lock().killed.push(session.to_string());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSession, FakeTmuxAdapter};

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
