//! HTTP plumbing shared by the adapters.

use gateway_core::GatewayError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::error;

/// Build the pooled HTTP client for one adapter
///
/// # Errors
/// Returns error if the TLS backend cannot be initialized
pub fn build_client(timeout: Duration) -> Result<Client, GatewayError> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(100)
        .build()
        .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))
}

/// Map a reqwest transport failure
pub fn transport_error(provider: &str, timeout: Duration, err: &reqwest::Error) -> GatewayError {
    error!(provider, error = %err, "Upstream request failed");
    if err.is_timeout() {
        GatewayError::timeout(timeout)
    } else {
        GatewayError::provider(provider, format!("Request failed: {err}"), None, true)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { message: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}

/// Best-effort error message from an upstream body
#[must_use]
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested {
            error: ErrorDetail::Object { message } | ErrorDetail::Text(message),
        })
        | Ok(ErrorBody::Flat { message }) => message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.chars().take(512).collect(),
    }
}

/// Map a non-2xx upstream response to a gateway error
///
/// An upstream 404 stays a provider error; `ModelNotFound` is reserved for
/// names the catalog does not know.
#[must_use]
pub fn status_error(provider: &str, status: u16, body: &str) -> GatewayError {
    let message = error_message(body);
    match status {
        401 | 403 => GatewayError::authentication(message, status),
        429 => GatewayError::rate_limit(None, Some(message)),
        500..=599 => GatewayError::provider(provider, message, Some(status), true),
        _ => GatewayError::provider(provider, message, Some(status), false),
    }
}
