//! OpenTelemetry tracer setup.
//!
//! Builds the SDK tracer provider that backs the optional
//! `tracing-opentelemetry` layer installed by [`crate::init_logging`].
//! Spans stay in process; exporting them is left to whoever installs a
//! span processor on the returned provider.

use opentelemetry::KeyValue;
use opentelemetry_sdk::{
    trace::{Config, RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing::info;

const SERVICE_NAME: &str = "chat-model-gateway";

/// Tracer settings
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Reported `service.name`
    pub service_name: String,
    /// Reported `service.version`
    pub service_version: String,
    /// Reported `deployment.environment`
    pub environment: String,
    /// Fraction of chat requests sampled, within `0.0..=1.0`
    pub sampling_rate: f64,
    /// Provider ids enabled in this deployment, reported as `gateway.providers`
    pub providers: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            sampling_rate: 1.0,
            providers: Vec::new(),
        }
    }
}

impl TracingConfig {
    /// Set the deployment environment
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Set the sampling rate; out-of-range values are clamped
    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Record which providers this deployment serves
    #[must_use]
    pub fn with_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = providers.into_iter().map(Into::into).collect();
        self
    }

    fn sampler(&self) -> Sampler {
        match self.sampling_rate {
            rate if rate >= 1.0 => Sampler::AlwaysOn,
            rate if rate <= 0.0 => Sampler::AlwaysOff,
            rate => Sampler::TraceIdRatioBased(rate),
        }
    }

    fn resource_attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.version", self.service_version.clone()),
            KeyValue::new("deployment.environment", self.environment.clone()),
        ];
        if !self.providers.is_empty() {
            attributes.push(KeyValue::new("gateway.providers", self.providers.join(",")));
        }
        attributes
    }
}

/// Build the SDK tracer provider for `config`
#[must_use]
pub fn tracer_provider(config: &TracingConfig) -> TracerProvider {
    let sdk_config = Config::default()
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(Resource::new(config.resource_attributes()));

    TracerProvider::builder().with_config(sdk_config).build()
}

/// Drop the tracer provider, flushing buffered spans
pub fn shutdown_tracing(provider: Option<TracerProvider>) {
    if let Some(provider) = provider {
        drop(provider);
        info!("Tracer provider shut down");
    }
}

/// Tracing initialization error
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// A global subscriber is already installed, or the filter is invalid
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// Span covering one chat completion, from dispatch to the last chunk
#[macro_export]
macro_rules! chat_request_span {
    ($request_id:expr, $model:expr, $provider:expr, $stream:expr) => {
        tracing::info_span!(
            "chat_completion",
            request_id = %$request_id,
            model = %$model,
            provider = %$provider,
            stream = $stream,
            otel.kind = "server"
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute(attributes: &[KeyValue], key: &str) -> Option<String> {
        attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.as_str().into_owned())
    }

    #[test]
    fn test_defaults() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "chat-model-gateway");
        assert!(matches!(config.sampler(), Sampler::AlwaysOn));

        let attributes = config.resource_attributes();
        assert_eq!(attributes.len(), 3);
        assert_eq!(
            attribute(&attributes, "service.name").as_deref(),
            Some("chat-model-gateway")
        );
    }

    #[test]
    fn test_sampler_follows_rate() {
        let half = TracingConfig::default().with_sampling_rate(0.5);
        assert!(matches!(half.sampler(), Sampler::TraceIdRatioBased(_)));

        let above = TracingConfig::default().with_sampling_rate(1.5);
        assert!((above.sampling_rate - 1.0).abs() < f64::EPSILON);
        assert!(matches!(above.sampler(), Sampler::AlwaysOn));

        let below = TracingConfig::default().with_sampling_rate(-0.5);
        assert!(matches!(below.sampler(), Sampler::AlwaysOff));
    }

    #[test]
    fn test_provider_attribute() {
        let config = TracingConfig::default()
            .with_environment("staging")
            .with_providers(["google", "grok"]);
        let attributes = config.resource_attributes();

        assert_eq!(
            attribute(&attributes, "deployment.environment").as_deref(),
            Some("staging")
        );
        assert_eq!(
            attribute(&attributes, "gateway.providers").as_deref(),
            Some("google,grok")
        );
    }

    #[test]
    fn test_provider_builds_and_shuts_down() {
        let provider = tracer_provider(&TracingConfig::default().with_sampling_rate(0.0));
        shutdown_tracing(Some(provider));
        shutdown_tracing(None);
    }

    #[test]
    fn test_span_macro() {
        let span = chat_request_span!("req-1", "grok-3", "grok", true);
        drop(span);
    }
}
