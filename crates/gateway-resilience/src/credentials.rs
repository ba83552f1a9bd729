//! Credential pool and per-call key rotation.
//!
//! A [`CredentialRotator`] starts at a random key and walks the pool once.
//! Failures that point at the key itself (quota, revoked, rate limited)
//! move on to the next key; anything else ends the call.

use crate::retry::{RetryClassifier, RetryConfig, RetryPolicy, RetryResult};
use gateway_core::GatewayError;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keys shorter than this are treated as blanks or typos
const MIN_KEY_LEN: usize = 10;

/// Characters of a key that may appear in logs
const KEY_PREFIX_LEN: usize = 8;

/// First characters of a key, safe to log
#[must_use]
pub fn key_prefix(key: &SecretString) -> String {
    key.expose_secret().chars().take(KEY_PREFIX_LEN).collect()
}

/// Immutable list of API keys
#[derive(Clone, Default)]
pub struct CredentialPool {
    keys: Vec<SecretString>,
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("len", &self.keys.len())
            .finish()
    }
}

impl CredentialPool {
    /// Parse a `,` / `;` / newline separated key list
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let keys: Vec<SecretString> = raw
            .split([',', ';', '\n'])
            .map(str::trim)
            .filter(|k| k.len() >= MIN_KEY_LEN)
            .map(|k| SecretString::new(k.to_string()))
            .collect();

        debug!(keys = keys.len(), "Parsed credential pool");
        Self { keys }
    }

    /// Parse the pool from a secret holding the raw list
    #[must_use]
    pub fn from_secret(raw: &SecretString) -> Self {
        Self::parse(raw.expose_secret())
    }

    /// Build a pool from already separated keys
    #[must_use]
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|k| SecretString::new(k.into()))
                .collect(),
        }
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` when no usable key was configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Uniformly random starting position
    #[must_use]
    pub fn start_index(&self) -> usize {
        if self.keys.is_empty() {
            0
        } else {
            rand::thread_rng().gen_range(0..self.keys.len())
        }
    }

    /// Key used on `attempt` of a call that started at `start`
    #[must_use]
    pub fn key_at(&self, start: usize, attempt: usize) -> Option<SecretString> {
        if self.keys.is_empty() {
            return None;
        }
        let index = (start + attempt) % self.keys.len();
        Some(SecretString::new(self.keys[index].expose_secret().clone()))
    }

    /// Every key exactly once, beginning at `start` and wrapping around
    pub fn rotation_from(&self, start: usize) -> impl Iterator<Item = SecretString> + '_ {
        (0..self.keys.len()).filter_map(move |attempt| self.key_at(start, attempt))
    }
}

/// Classifies failures that another key might fix
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationClassifier;

impl RotationClassifier {
    const STATUSES: [u16; 4] = [429, 400, 401, 403];
    const KEYWORDS: [&'static str; 5] = ["quota", "leaked", "expired", "invalid", "not valid"];
}

impl RetryClassifier for RotationClassifier {
    fn is_retryable(&self, error: &GatewayError) -> bool {
        if error
            .upstream_status()
            .is_some_and(|status| Self::STATUSES.contains(&status))
        {
            return true;
        }
        let message = error.to_string().to_lowercase();
        Self::KEYWORDS.iter().any(|kw| message.contains(kw))
    }
}

/// Callback receiving `(provider, outcome)` after each attempt, where
/// outcome is `success`, `rotate` or `fatal`
pub type AttemptObserver = Arc<dyn Fn(&str, &'static str) + Send + Sync>;

/// Runs one logical call against successive keys of a pool
#[derive(Clone)]
pub struct CredentialRotator {
    provider: String,
    pool: CredentialPool,
    policy: RetryPolicy,
    observer: Option<AttemptObserver>,
}

impl fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("provider", &self.provider)
            .field("pool", &self.pool)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl CredentialRotator {
    /// Create a rotator for `provider`
    #[must_use]
    pub fn new(provider: impl Into<String>, pool: CredentialPool) -> Self {
        let config = RetryConfig {
            max_attempts: u32::try_from(pool.len()).unwrap_or(u32::MAX),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        };
        Self {
            provider: provider.into(),
            pool,
            policy: RetryPolicy::with_classifier(config, RotationClassifier),
            observer: None,
        }
    }

    /// Report every attempt outcome to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The pool being rotated
    #[must_use]
    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Run `operation` with keys starting at a random position
    ///
    /// # Errors
    /// Returns the first fatal error, the last error once every key has
    /// been tried, or `Exhausted` for an empty pool
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: FnMut(SecretString) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.execute_from(self.pool.start_index(), operation).await
    }

    /// Run `operation` with keys starting at `start`
    ///
    /// # Errors
    /// Same as [`CredentialRotator::execute`]
    pub async fn execute_from<F, Fut, T>(
        &self,
        start: usize,
        mut operation: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut(SecretString) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        if self.pool.is_empty() {
            warn!(provider = %self.provider, "No usable credentials configured");
            return Err(GatewayError::exhausted(
                0,
                format!("no usable credentials for {}", self.provider),
            ));
        }

        let total = self.pool.len();
        let provider = self.provider.as_str();
        let pool = &self.pool;
        let observer = self.observer.as_ref();

        let result = self
            .policy
            .run(|attempt| {
                let call = pool
                    .key_at(start, attempt as usize)
                    .map(|key| (key_prefix(&key), operation(key)));
                async move {
                    let (prefix, call) = call
                        .ok_or_else(|| GatewayError::internal("credential index out of range"))?;
                    let outcome = call.await;
                    let label = match &outcome {
                        Ok(_) => {
                            info!(
                                provider,
                                key = %prefix,
                                attempt = attempt + 1,
                                total,
                                outcome = "success",
                                "Credential attempt"
                            );
                            "success"
                        }
                        Err(e) => {
                            let label = if RotationClassifier.is_retryable(e) {
                                "rotate"
                            } else {
                                "fatal"
                            };
                            warn!(
                                provider,
                                key = %prefix,
                                attempt = attempt + 1,
                                total,
                                status = e.upstream_status(),
                                outcome = label,
                                error = %e,
                                "Credential attempt"
                            );
                            label
                        }
                    };
                    if let Some(observe) = observer {
                        observe(provider, label);
                    }
                    outcome
                }
            })
            .await;

        if let RetryResult::Failed { attempts, .. } = &result {
            warn!(provider, attempts, "All credentials failed");
        }
        result.into_result()
    }
}
