//! Process signal handling for graceful shutdown.

use tokio::signal;
use tracing::{error, info};

/// Resolve when Ctrl-C or SIGTERM arrives, returning the signal name
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        "ctrl+c"
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
        "sigterm"
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&'static str>();

    let name = tokio::select! {
        name = ctrl_c => name,
        name = sigterm => name,
    };
    info!(signal = name, "Shutdown signal received, draining connections");
    name
}
