//! Prometheus metrics.
//!
//! One [`Metrics`] instance owns a private registry and is shared by the
//! server state. Clones share the same underlying counters.

use gateway_resilience::AttemptObserver;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Completion outcome label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The upstream answered
    Success,
    /// The request failed
    Error,
}

impl Outcome {
    /// Label value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Metrics registration or encoding error
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Prometheus rejected a metric
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    /// Encoded output was not UTF-8
    #[error("Metrics encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Gateway metrics
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    completions: IntCounterVec,
    request_duration: HistogramVec,
    credential_attempts: IntCounterVec,
    synthetic_streams: IntCounterVec,
    search_reroutes: IntCounter,
    truncations: IntCounter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register all gateway metrics
    ///
    /// # Errors
    /// Returns error if a metric cannot be registered
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let completions = IntCounterVec::new(
            Opts::new(
                "gateway_chat_completions_total",
                "Chat completions by provider, mode and outcome",
            ),
            &["provider", "mode", "outcome"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "gateway_chat_completion_duration_seconds",
                "Time until the upstream answered or the stream opened",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["provider", "mode"],
        )?;
        let credential_attempts = IntCounterVec::new(
            Opts::new(
                "gateway_credential_attempts_total",
                "Credential attempts by provider and outcome",
            ),
            &["provider", "outcome"],
        )?;
        let synthetic_streams = IntCounterVec::new(
            Opts::new(
                "gateway_synthetic_streams_total",
                "Single-piece replies replayed as streams",
            ),
            &["provider"],
        )?;
        let search_reroutes = IntCounter::with_opts(Opts::new(
            "gateway_search_reroutes_total",
            "Requests routed to a search-augmented model",
        ))?;
        let truncations = IntCounter::with_opts(Opts::new(
            "gateway_prompt_truncations_total",
            "User messages cut to the model's character budget",
        ))?;

        registry.register(Box::new(completions.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(credential_attempts.clone()))?;
        registry.register(Box::new(synthetic_streams.clone()))?;
        registry.register(Box::new(search_reroutes.clone()))?;
        registry.register(Box::new(truncations.clone()))?;

        Ok(Self {
            registry,
            completions,
            request_duration,
            credential_attempts,
            synthetic_streams,
            search_reroutes,
            truncations,
        })
    }

    /// Record a finished completion call
    pub fn record_completion(&self, provider: &str, stream: bool, outcome: Outcome, elapsed: Duration) {
        let mode = if stream { "stream" } else { "json" };
        self.completions
            .with_label_values(&[provider, mode, outcome.as_str()])
            .inc();
        self.request_duration
            .with_label_values(&[provider, mode])
            .observe(elapsed.as_secs_f64());
    }

    /// Record one credential attempt
    pub fn record_credential_attempt(&self, provider: &str, outcome: &str) {
        self.credential_attempts
            .with_label_values(&[provider, outcome])
            .inc();
    }

    /// Record a synthesized stream
    pub fn record_synthetic_stream(&self, provider: &str) {
        self.synthetic_streams.with_label_values(&[provider]).inc();
    }

    /// Record a search reroute
    pub fn record_search_reroute(&self) {
        self.search_reroutes.inc();
    }

    /// Record a truncated prompt
    pub fn record_truncation(&self) {
        self.truncations.inc();
    }

    /// Observer that feeds credential rotation outcomes into these metrics
    #[must_use]
    pub fn attempt_observer(&self) -> AttemptObserver {
        let attempts = self.credential_attempts.clone();
        Arc::new(move |provider: &str, outcome: &'static str| {
            attempts.with_label_values(&[provider, outcome]).inc();
        })
    }

    /// Render all metrics in the Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
