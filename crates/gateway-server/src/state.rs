//! Shared application state.

use gateway_config::GatewayConfig;
use gateway_routing::Catalog;
use gateway_telemetry::{Metrics, MetricsError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// State handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<GatewayConfig>,
    /// Immutable model catalog
    pub catalog: Arc<Catalog>,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create a new state builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Seconds since startup
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Builder for [`AppState`]
#[derive(Debug, Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    catalog: Option<Arc<Catalog>>,
    metrics: Option<Metrics>,
}

impl AppStateBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the catalog
    #[must_use]
    pub fn catalog(mut self, catalog: impl Into<Arc<Catalog>>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Set the metrics
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the state; missing parts default to an empty catalog and fresh metrics
    ///
    /// # Errors
    /// Returns error if metrics cannot be registered
    pub fn build(self) -> Result<AppState, MetricsError> {
        let config = self.config.unwrap_or_default();
        let catalog = self.catalog.unwrap_or_else(|| {
            Arc::new(Catalog::new(
                Vec::new(),
                &config.display_order,
                BTreeMap::new(),
            ))
        });
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Metrics::new()?,
        };

        Ok(AppState {
            config: Arc::new(config),
            catalog,
            metrics,
            started_at: Instant::now(),
        })
    }
}
