//! Retry policy with exponential backoff.
//!
//! One policy object serves every bounded retry in the gateway. Callers
//! choose the attempt budget, the backoff curve and a [`RetryClassifier`];
//! the operation receives the 0-based attempt index so it can vary its
//! inputs (the credential rotator uses it to pick the next key).

use gateway_core::GatewayError;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether a failed attempt may be followed by another
pub trait RetryClassifier: Send + Sync + fmt::Debug {
    /// `true` if the error is worth another attempt
    fn is_retryable(&self, error: &GatewayError) -> bool;
}

/// Retries transient errors and configured upstream statuses
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    retry_on_status: Vec<u16>,
}

impl StatusClassifier {
    /// Retry on the given statuses in addition to transient errors
    #[must_use]
    pub fn new(retry_on_status: Vec<u16>) -> Self {
        Self { retry_on_status }
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(vec![429, 500, 502, 503, 504])
    }
}

impl RetryClassifier for StatusClassifier {
    fn is_retryable(&self, error: &GatewayError) -> bool {
        if let Some(code) = error.upstream_status() {
            if self.retry_on_status.contains(&code) {
                return true;
            }
        }
        match error {
            GatewayError::Validation { .. }
            | GatewayError::ModelNotFound { .. }
            | GatewayError::Authentication { .. }
            | GatewayError::Configuration { .. } => false,
            _ => error.is_retryable(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay between attempts
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
    /// Jitter factor (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

/// Retry policy implementation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: Arc<dyn RetryClassifier>,
}

impl RetryPolicy {
    /// Create a policy with the default status classifier
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self::with_classifier(config, StatusClassifier::default())
    }

    /// Create a policy with a custom classifier
    #[must_use]
    pub fn with_classifier(config: RetryConfig, classifier: impl RetryClassifier + 'static) -> Self {
        Self {
            config,
            classifier: Arc::new(classifier),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Create a policy with a custom attempt budget
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(RetryConfig {
            max_attempts,
            ..Default::default()
        })
    }

    /// Calculate the delay after a failed attempt (0-indexed)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay.as_millis() as f64;
        if base <= 0.0 {
            return Duration::ZERO;
        }
        let delay = base * self.config.multiplier.powi(attempt as i32);
        let delay = delay.min(self.config.max_delay.as_millis() as f64);

        let jitter_range = delay * self.config.jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_delay = (delay + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }

    /// Check if an error is retryable under this policy
    #[must_use]
    pub fn is_retryable(&self, error: &GatewayError) -> bool {
        self.classifier.is_retryable(error)
    }

    /// Run an operation, reporting how it ended and how many attempts it took
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> RetryResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let max_attempts = self.config.max_attempts;
        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..max_attempts {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "Retry succeeded");
                    }
                    return RetryResult::Success {
                        value,
                        attempts: attempt + 1,
                    };
                }
                Err(error) => {
                    if !self.is_retryable(&error) {
                        return RetryResult::NonRetryable {
                            error,
                            attempts: attempt + 1,
                        };
                    }
                    if attempt + 1 == max_attempts {
                        return RetryResult::Failed {
                            error,
                            attempts: max_attempts,
                        };
                    }

                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "Retrying after error"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        RetryResult::Failed {
            error: last_error
                .unwrap_or_else(|| GatewayError::exhausted(max_attempts, "no attempts were made")),
            attempts: max_attempts,
        }
    }

    /// Execute an operation with retry logic
    ///
    /// # Errors
    /// Returns the first non-retryable error, or the last error once the
    /// attempt budget is spent
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.run(operation).await.into_result()
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success {
        /// Produced value
        value: T,
        /// Attempts made, including the successful one
        attempts: u32,
    },
    /// Operation failed after all attempts
    Failed {
        /// The final error
        error: GatewayError,
        /// Number of attempts made
        attempts: u32,
    },
    /// Operation failed with non-retryable error
    NonRetryable {
        /// The error
        error: GatewayError,
        /// Number of attempts made
        attempts: u32,
    },
}

impl<T> RetryResult<T> {
    /// Convert to a Result
    ///
    /// # Errors
    /// Returns the error if the operation failed
    pub fn into_result(self) -> Result<T, GatewayError> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failed { error, .. } | Self::NonRetryable { error, .. } => Err(error),
        }
    }

    /// Number of attempts made
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::NonRetryable { attempts, .. } => *attempts,
        }
    }

    /// Check if the operation succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Builder for retry policy
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    config: RetryConfig,
    retry_on_status: Option<Vec<u16>>,
}

impl RetryPolicyBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total attempt budget
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    /// Set base delay
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    /// Set max delay
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    /// Set jitter factor
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.config.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Set status codes to retry on
    #[must_use]
    pub fn retry_on_status(mut self, codes: Vec<u16>) -> Self {
        self.retry_on_status = Some(codes);
        self
    }

    /// Build the policy
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let classifier = self
            .retry_on_status
            .map_or_else(StatusClassifier::default, StatusClassifier::new);
        RetryPolicy::with_classifier(self.config, classifier)
    }
}
