//! HTTP listener.

use crate::{routes::create_router, shutdown::shutdown_signal, state::AppState};
use tokio::net::TcpListener;
use tracing::info;

/// Server startup or runtime error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not bind
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying error
        source: std::io::Error,
    },
    /// The server stopped with an I/O error
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Gateway HTTP server
#[derive(Debug)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server for `state`; the bind address comes from its config
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind and serve until Ctrl-C or SIGTERM
    ///
    /// # Errors
    /// Returns error if binding fails or the server stops abnormally
    pub async fn run(self) -> Result<(), ServerError> {
        let host = self.state.config.server.host.clone();
        let port = self.state.config.server.port;
        let addr = format!("{host}:{port}");

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(
            addr = %addr,
            providers = self.state.catalog.providers().len(),
            models = self.state.catalog.models().len(),
            "Gateway listening"
        );

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(async {
                shutdown_signal().await;
            })
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}
