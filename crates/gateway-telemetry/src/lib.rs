//! # Gateway Telemetry
//!
//! Observability for the chat model gateway.
//!
//! This crate provides:
//! - Structured logging through `tracing-subscriber`
//! - Optional OpenTelemetry span export
//! - Prometheus metrics for completions, credential attempts and synthetic streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;
pub mod tracing_setup;

// Re-export main types
pub use logging::{init_logging, LoggingConfig, LoggingGuard};
pub use metrics::{Metrics, MetricsError, Outcome};
pub use tracing_setup::{shutdown_tracing, tracer_provider, TracingConfig, TracingError};
