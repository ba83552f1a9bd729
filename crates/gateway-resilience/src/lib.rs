//! # Gateway Resilience
//!
//! Resilience patterns for the chat model gateway:
//! - A single retry policy with exponential backoff and pluggable classification
//! - A credential pool parsed from a delimited key list
//! - A credential rotator that walks the pool once per call

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod retry;

// Re-export main types
pub use credentials::{
    key_prefix, AttemptObserver, CredentialPool, CredentialRotator, RotationClassifier,
};
pub use retry::{
    RetryClassifier, RetryConfig, RetryPolicy, RetryPolicyBuilder, RetryResult, StatusClassifier,
};
