//! Graceful shutdown for the ordo CLI
//!
//! The first SIGINT or SIGTERM cancels the run token: running tasks finish,
//! nothing new starts, and the partial report is still printed.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Install signal handlers that cancel the returned token.
pub fn install_signal_handlers() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            warn!(
                error = %e,
                "Failed to install signal handlers; Ctrl+C will not cancel gracefully"
            );
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, finishing running tasks");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, finishing running tasks");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, finishing running tasks"),
        Err(e) => {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
