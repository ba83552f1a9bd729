//! Configuration types.

use gateway_core::ProviderKind;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener
    #[validate(nested)]
    pub server: ServerSettings,

    /// Logging and tracing
    pub logging: LoggingSettings,

    /// Per-provider settings keyed by provider id (`deepinfra`, `google`, ...)
    #[validate(nested)]
    pub providers: BTreeMap<String, ProviderSettings>,

    /// Provider ids in presentation order; unlisted providers sort last
    pub display_order: Vec<String>,

    /// Internal model id to the search-augmented variant used for search-like prompts
    pub search_variants: BTreeMap<String, String>,

    /// Pause between words of a synthesized stream
    #[serde(with = "humantime_serde")]
    pub stream_word_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            providers: BTreeMap::new(),
            display_order: vec![
                "google".to_string(),
                "deepinfra".to_string(),
                "grok".to_string(),
                "gpt-oss".to_string(),
                "sonnet-free".to_string(),
                "a4f".to_string(),
                "makehub".to_string(),
                "laozhang".to_string(),
                "typegpt".to_string(),
            ],
            search_variants: BTreeMap::from([(
                "gemini-2.0-flash".to_string(),
                "gemini-2.0-flash-search".to_string(),
            )]),
            stream_word_delay: Duration::from_millis(20),
        }
    }
}

impl GatewayConfig {
    /// Settings for a provider, defaults when the provider has no entry
    #[must_use]
    pub fn provider(&self, kind: ProviderKind) -> ProviderSettings {
        self.providers.get(kind.id()).cloned().unwrap_or_default()
    }

    /// Mutable settings for a provider, inserting defaults if absent
    pub fn provider_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        self.providers.entry(kind.id().to_string()).or_default()
    }

    /// Ids of providers not switched off, in declaration order
    #[must_use]
    pub fn enabled_provider_ids(&self) -> Vec<&'static str> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.provider(*kind).enabled)
            .map(ProviderKind::id)
            .collect()
    }

    /// Rank of a provider in `display_order`
    #[must_use]
    pub fn order_rank(&self, provider_id: &str) -> Option<usize> {
        self.display_order.iter().position(|id| id == provider_id)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host
    pub host: String,
    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,
    /// Per-request timeout for non-streaming calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Attach an OpenTelemetry tracing layer
    pub opentelemetry: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            opentelemetry: false,
        }
    }
}

/// Settings for one upstream provider
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ProviderSettings {
    /// Register the provider at startup
    pub enabled: bool,
    /// API key, or a `,` / `;` / newline separated key list where rotation applies
    pub api_key: Option<SecretString>,
    /// Base URL override (required for single-prompt upstreams)
    #[validate(url)]
    pub base_url: Option<String>,
    /// Upstream request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.stream_word_delay, Duration::from_millis(20));
        assert_eq!(
            config.search_variants.get("gemini-2.0-flash").map(String::as_str),
            Some("gemini-2.0-flash-search")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_defaults_when_missing() {
        let config = GatewayConfig::default();
        let settings = config.provider(ProviderKind::Grok);
        assert!(settings.enabled);
        assert!(settings.api_key.is_none());
        assert!(settings.base_url.is_none());
    }

    #[test]
    fn test_order_rank() {
        let config = GatewayConfig::default();
        assert_eq!(config.order_rank("google"), Some(0));
        assert_eq!(config.order_rank("workers"), None);
    }

    #[test]
    fn test_enabled_provider_ids() {
        let mut config = GatewayConfig::default();
        assert_eq!(config.enabled_provider_ids().len(), ProviderKind::ALL.len());

        config.provider_mut(ProviderKind::Codex).enabled = false;
        let ids = config.enabled_provider_ids();
        assert!(!ids.contains(&"codex"));
        assert_eq!(ids[0], "deepinfra");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = GatewayConfig::default();
        config.provider_mut(ProviderKind::Grok).base_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = GatewayConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }
}
