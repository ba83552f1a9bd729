//! Global `tracing` subscriber setup.

use crate::tracing_setup::{shutdown_tracing, tracer_provider, TracingConfig, TracingError};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines
    pub json: bool,
    /// Export spans through OpenTelemetry
    pub opentelemetry: bool,
    /// Tracer settings used when `opentelemetry` is on
    pub tracing: TracingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            opentelemetry: false,
            tracing: TracingConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Create a configuration with a default filter level
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Toggle JSON output
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Toggle the OpenTelemetry layer
    #[must_use]
    pub fn with_opentelemetry(mut self, enabled: bool) -> Self {
        self.opentelemetry = enabled;
        self
    }

    /// Replace the tracer settings
    #[must_use]
    pub fn with_tracing(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }

    /// Filter from `RUST_LOG`, falling back to the configured level
    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| TracingError::Init(format!("invalid log level {}: {e}", self.level))),
        }
    }
}

/// Keeps the tracer provider alive until shutdown
#[derive(Debug, Default)]
pub struct LoggingGuard {
    provider: Option<TracerProvider>,
}

impl LoggingGuard {
    /// Flush and drop the tracer provider
    pub fn shutdown(self) {
        shutdown_tracing(self.provider);
    }
}

/// Install the global subscriber
///
/// # Errors
/// Returns error if the filter is invalid or a subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, TracingError> {
    let filter = config.filter()?;

    let json_layer = config
        .json
        .then(|| fmt::layer().json().with_current_span(true).with_target(true));
    let text_layer = (!config.json).then(|| fmt::layer().with_target(true));

    let provider = config
        .opentelemetry
        .then(|| tracer_provider(&config.tracing));
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.tracing.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TracingError::Init(e.to_string()))?;

    info!(
        level = %config.level,
        json = config.json,
        opentelemetry = config.opentelemetry,
        "Logging initialized"
    );

    Ok(LoggingGuard { provider })
}
