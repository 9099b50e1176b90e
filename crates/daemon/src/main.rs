// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! companiond: tails AI assistant conversation logs, resolves them to tmux
//! sessions, and serves the result over an authenticated WebSocket.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use companion_adapters::RealTmuxAdapter;
use companion_daemon::{orchestrator, CompanionConfig, SharedState};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CompanionConfig::from_env();
    let _log_guard = setup_logging(&config);

    info!(
        watched_root = %config.watched_root.display(),
        bind_addr = %config.bind_addr,
        "starting companiond",
    );

    let now_ms = epoch_ms();
    let state = Arc::new(SharedState::new(config.clone(), now_ms));
    let tmux = RealTmuxAdapter::default();
    let shutdown = CancellationToken::new();

    let orchestrator_state = state.clone();
    let orchestrator_tmux = tmux.clone();
    let orchestrator_shutdown = shutdown.clone();
    let orchestrator_handle = tokio::spawn(async move {
        if let Err(err) = orchestrator::run(orchestrator_state, orchestrator_tmux, orchestrator_shutdown).await {
            error!(error = %err, "orchestrator loop exited with an error");
        }
    });

    let listener_state = state.clone();
    let listener_addr = state.config.bind_addr;
    let listener_handle = tokio::spawn(async move {
        if let Err(err) = companion_daemon::listener::run(listener_state, tmux, listener_addr).await {
            error!(error = %err, "websocket listener exited with an error");
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
        _ = listener_handle => {
            error!("websocket listener task ended unexpectedly");
        }
    }

    shutdown.cancel();
    let _ = orchestrator_handle.await;

    info!("companiond stopped");
    Ok(())
}

fn epoch_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Sets up a stderr subscriber plus, when `COMPANION_LOG_PATH` is set, a
/// non-blocking rolling-file layer (grounded on the template daemon's
/// `setup_logging`).
fn setup_logging(config: &CompanionConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_path {
        Some(path) => {
            let (dir, file_name) = match (path.parent(), path.file_name()) {
                (Some(dir), Some(file_name)) => (dir, file_name),
                _ => {
                    tracing_subscriber::registry().with(filter()).with(fmt::layer()).init();
                    return None;
                }
            };
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("failed to create log directory {}: {err}", dir.display());
            }
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(filter())
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter()).with(fmt::layer()).init();
            None
        }
    }
}
