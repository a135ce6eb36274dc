//! Translates process signals into replay cancellation.

use anyhow::Context;
use archive_replay_core::CancelHandle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cancel `handle` on the first SIGINT or SIGTERM
pub fn spawn_signal_listener(handle: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!(signal, "Received shutdown signal, cancelling");
                handle.cancel();
            }
            Err(e) => warn!(error = %e, "Signal handling unavailable"),
        }
    })
}

async fn wait_for_signal() -> anyhow::Result<&'static str> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C signal handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM signal handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        result = ctrl_c => result.map(|_| "SIGINT"),
        result = terminate => result.map(|_| "SIGTERM"),
    }
}
