//! Shutdown Signals
//!
//! Waits for SIGINT or SIGTERM and cancels the process-wide token.

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel `token`.
///
/// Returns early without cancelling anything else if `token` is cancelled
/// first.
#[allow(clippy::expect_used)]
pub async fn await_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = token.cancelled() => return,
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    token.cancel();
}
