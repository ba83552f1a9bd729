//! Error types for the gateway.
//!
//! Every crate in the workspace reports failures through [`GatewayError`].
//! At the HTTP boundary an error becomes an OpenAI-shaped envelope
//! (`{"error": {"message", "type"}}`).

use serde_json::json;
use std::time::Duration;

/// Result alias used across the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Unified gateway error
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The caller's request is malformed
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable message
        message: String,
        /// Offending field, if known
        field: Option<String>,
        /// Machine readable code
        code: String,
    },

    /// No adapter serves the requested model
    #[error("Model not found: {model}")]
    ModelNotFound {
        /// Requested model name
        model: String,
    },

    /// Upstream rejected the credential (401/403)
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Upstream message
        message: String,
        /// Upstream status (401 or 403)
        status_code: u16,
    },

    /// Upstream rate limited the call (429)
    #[error(
        "Rate limit exceeded{}",
        message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
    )]
    RateLimit {
        /// Suggested wait, if the upstream sent one
        retry_after: Option<Duration>,
        /// Upstream message
        message: Option<String>,
    },

    /// Any other upstream transport or HTTP failure
    #[error("Provider {provider} error: {message}")]
    Provider {
        /// Provider id
        provider: String,
        /// Error message
        message: String,
        /// Upstream HTTP status, if a response was received
        status_code: Option<u16>,
        /// Whether a retry might succeed
        retryable: bool,
    },

    /// Failure while reading a streaming body
    #[error("Streaming error: {message}")]
    Streaming {
        /// Error message
        message: String,
    },

    /// Upstream did not answer in time
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// Elapsed time budget
        duration: Duration,
    },

    /// Invalid gateway configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Every attempt failed without a captured error
    #[error("All {attempts} attempts failed: {message}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error message
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a validation error
    pub fn validation(
        message: impl Into<String>,
        field: Option<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field,
            code: code.into(),
        }
    }

    /// Create a model-not-found error
    pub fn model_not_found(model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            model: model.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>, status_code: u16) -> Self {
        Self::Authentication {
            message: message.into(),
            status_code,
        }
    }

    /// Create a rate limit error
    pub fn rate_limit(retry_after: Option<Duration>, message: Option<String>) -> Self {
        Self::RateLimit {
            retry_after,
            message,
        }
    }

    /// Create a provider error
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Create a streaming error
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an exhaustion error
    pub fn exhausted(attempts: u32, message: impl Into<String>) -> Self {
        Self::Exhausted {
            attempts,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status reported by the upstream, if this error came from one
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status_code, .. } => Some(*status_code),
            Self::RateLimit { .. } => Some(429),
            Self::Provider { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Whether a plain retry of the same call might succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::RateLimit { .. } | Self::Timeout { .. } | Self::Streaming { .. } => true,
            _ => false,
        }
    }

    /// OpenAI error `type` string
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request_error",
            Self::ModelNotFound { .. } => "model_not_found",
            Self::Authentication { .. } => "authentication_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::Provider { .. } | Self::Streaming { .. } | Self::Timeout { .. } => {
                "upstream_error"
            }
            Self::Exhausted { .. } => "all_attempts_failed",
            Self::Configuration { .. } | Self::Internal { .. } => "server_error",
        }
    }

    /// HTTP status the caller sees.
    ///
    /// Caller mistakes keep their 4xx status; every upstream failure is a 500.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::ModelNotFound { .. } => 404,
            _ => 500,
        }
    }

    /// OpenAI-shaped error envelope
    #[must_use]
    pub fn envelope(&self) -> serde_json::Value {
        json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
            }
        })
    }
}
