//! Configuration loading: file, then environment overrides, then validation.

use crate::config::GatewayConfig;
use gateway_core::ProviderKind;
use secrecy::SecretString;
use std::path::Path;
use tracing::{debug, info, warn};
use validator::Validate;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
    /// File could not be parsed
    #[error("failed to parse config file {path}: {message}")]
    Parse {
        /// File path
        path: String,
        /// Parser message
        message: String,
    },
    /// An environment override has an invalid value
    #[error("invalid value for {var}: {message}")]
    Env {
        /// Variable name
        var: String,
        /// Error message
        message: String,
    },
    /// Validation failed
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Load configuration from `GATEWAY_CONFIG` (if set) and the process environment
///
/// # Errors
/// Returns error if the file cannot be read or parsed, or validation fails
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => read_file(Path::new(path.trim())).await?,
        _ => {
            debug!("No configuration file set, using defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    config.validate()?;

    info!(
        providers = config.providers.len(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Load configuration from a file, then apply environment overrides
///
/// # Errors
/// Returns error if the file cannot be read or parsed, or validation fails
pub async fn load_config_from_path(path: impl AsRef<Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = read_file(path.as_ref()).await?;
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    config.validate()?;
    Ok(config)
}

async fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let display = path.display().to_string();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("yaml")
        .to_ascii_lowercase();

    let parsed = match extension.as_str() {
        "toml" => toml::from_str(&contents).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(&contents).map_err(|e| e.to_string()),
        _ => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: display,
        message,
    })
}

/// Environment prefix for a provider id (`gpt-oss` → `GPT_OSS`)
#[must_use]
pub fn env_prefix(kind: ProviderKind) -> String {
    kind.id().replace('-', "_").to_ascii_uppercase()
}

/// Apply environment overrides using `lookup` to read variables
///
/// # Errors
/// Returns error if a numeric override does not parse
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(host) = non_empty("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = non_empty("GATEWAY_PORT") {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: "GATEWAY_PORT".to_string(),
            message: format!("{e}"),
        })?;
    }
    if let Some(level) = non_empty("GATEWAY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = non_empty("GATEWAY_LOG_JSON") {
        config.logging.json = matches!(json.trim(), "1" | "true" | "yes");
    }

    for kind in ProviderKind::ALL {
        let prefix = env_prefix(kind);

        // Google takes a key list for rotation under its own name first
        let key = if kind == ProviderKind::Google {
            non_empty("GOOGLE_API_KEYS").or_else(|| non_empty("GOOGLE_API_KEY"))
        } else {
            non_empty(&format!("{prefix}_API_KEY"))
        };
        if let Some(key) = key {
            debug!(provider = kind.id(), "API key set from environment");
            config.provider_mut(kind).api_key = Some(SecretString::new(key));
        }

        if let Some(url) = non_empty(&format!("{prefix}_BASE_URL")) {
            config.provider_mut(kind).base_url = Some(url.trim().to_string());
        }
    }

    for id in config.providers.keys() {
        if ProviderKind::from_id(id).is_none() {
            warn!(provider = %id, "Configuration names an unknown provider, ignoring");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(ProviderKind::GptOss), "GPT_OSS");
        assert_eq!(env_prefix(ProviderKind::DeepInfra), "DEEPINFRA");
        assert_eq!(env_prefix(ProviderKind::SonnetFree), "SONNET_FREE");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("GATEWAY_PORT", "9000"),
                ("DEEPINFRA_API_KEY", "di-key-0123456789"),
                ("GROK_BASE_URL", "https://grok.example.com/api"),
                ("GOOGLE_API_KEYS", "key-aaaaaaaaaa,key-bbbbbbbbbb"),
                ("GOOGLE_API_KEY", "ignored-because-list-wins"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config
                .provider(ProviderKind::DeepInfra)
                .api_key
                .unwrap()
                .expose_secret(),
            "di-key-0123456789"
        );
        assert_eq!(
            config.provider(ProviderKind::Grok).base_url.as_deref(),
            Some("https://grok.example.com/api")
        );
        assert_eq!(
            config
                .provider(ProviderKind::Google)
                .api_key
                .unwrap()
                .expose_secret(),
            "key-aaaaaaaaaa,key-bbbbbbbbbb"
        );
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = GatewayConfig::default();
        let result = apply_env_overrides(&mut config, lookup_from(&[("GATEWAY_PORT", "http")]));
        assert!(matches!(result, Err(ConfigError::Env { .. })));
    }

    #[tokio::test]
    async fn test_read_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
server:
  port: 8181
display_order: [grok, google]
stream_word_delay: 5ms
search_variants:
  gemini-2.0-flash: gemini-2.0-flash-search
providers:
  grok:
    base_url: https://grok.example.com/ask
    timeout: 30s
"#
        )
        .unwrap();

        let config = read_file(file.path()).await.unwrap();

        assert_eq!(config.server.port, 8181);
        assert_eq!(config.display_order, vec!["grok", "google"]);
        assert_eq!(config.stream_word_delay.as_millis(), 5);
        assert_eq!(
            config.search_variants.get("gemini-2.0-flash").map(String::as_str),
            Some("gemini-2.0-flash-search")
        );
        let grok = config.provider(ProviderKind::Grok);
        assert_eq!(grok.timeout.as_secs(), 30);
        assert!(grok.enabled);
    }

    #[tokio::test]
    async fn test_read_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
display_order = ["deepinfra"]

[server]
host = "127.0.0.1"

[providers.deepinfra]
enabled = false
"#
        )
        .unwrap();

        let config = read_file(file.path()).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.provider(ProviderKind::DeepInfra).enabled);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = read_file(Path::new("/nonexistent/gateway.yaml")).await;
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
