use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::notifier::Notifier;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping monitor...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping monitor...");
        }
    }
}

/// Cancel `token` on the first shutdown signal.
pub fn cancel_on_shutdown(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_shutdown() => token.cancel(),
            _ = token.cancelled() => {}
        }
    })
}

/// Drain hook actions still running before the process exits.
pub async fn drain_pending_actions(notifier: &dyn Notifier) {
    let started = std::time::Instant::now();
    notifier.wait_for_pending_actions().await;

    let elapsed = started.elapsed();
    if elapsed > Duration::from_millis(100) {
        tracing::debug!(elapsed = ?elapsed, "Pending hook actions finished");
    }
}
