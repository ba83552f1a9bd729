//! # Chat Model Gateway
//!
//! OpenAI-compatible gateway in front of many chat model upstreams.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults; every provider reads <PROVIDER>_API_KEY / <PROVIDER>_BASE_URL
//! GOOGLE_API_KEY="key-one,key-two" chat-model-gateway
//!
//! # Start with a config file
//! GATEWAY_CONFIG=/etc/gateway.yaml chat-model-gateway
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 RUST_LOG=debug chat-model-gateway
//! ```

use anyhow::Context;
use gateway_config::load_config;
use gateway_routing::build_registry_with_observer;
use gateway_server::{AppState, Server};
use gateway_telemetry::{init_logging, LoggingConfig, Metrics, TracingConfig};
use tracing::info;

/// Application entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().await.context("failed to load configuration")?;

    let logging = LoggingConfig::new(config.logging.level.clone())
        .with_json(config.logging.json)
        .with_opentelemetry(config.logging.opentelemetry)
        .with_tracing(TracingConfig::default().with_providers(config.enabled_provider_ids()));
    let guard = init_logging(&logging).context("failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting chat model gateway"
    );

    let metrics = Metrics::new().context("failed to register metrics")?;
    let catalog = build_registry_with_observer(&config, metrics.attempt_observer())
        .context("failed to build the model registry")?;

    let state = AppState::builder()
        .config(config)
        .catalog(catalog)
        .metrics(metrics)
        .build()?;

    Server::new(state).run().await?;

    guard.shutdown();
    Ok(())
}
