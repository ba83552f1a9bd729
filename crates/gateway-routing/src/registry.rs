//! Startup construction of provider adapters.

use crate::catalog::Catalog;
use gateway_config::{GatewayConfig, ProviderSettings};
use gateway_core::{GatewayError, LanguageModel, ProviderKind};
use gateway_providers::{
    default_base_url, BespokeConfig, BespokeProvider, GoogleConfig, GoogleProvider,
    OpenAICompatibleConfig, OpenAICompatibleProvider,
};
use gateway_resilience::{AttemptObserver, CredentialPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Construct every enabled adapter once and return the catalog
///
/// # Errors
/// Returns error if an enabled provider is misconfigured
pub fn build_registry(config: &GatewayConfig) -> Result<Catalog, GatewayError> {
    build(config, None)
}

/// Like [`build_registry`], reporting each credential attempt to `observer`
///
/// # Errors
/// Returns error if an enabled provider is misconfigured
pub fn build_registry_with_observer(
    config: &GatewayConfig,
    observer: AttemptObserver,
) -> Result<Catalog, GatewayError> {
    build(config, Some(observer))
}

fn build(
    config: &GatewayConfig,
    observer: Option<AttemptObserver>,
) -> Result<Catalog, GatewayError> {
    let mut providers: Vec<Arc<dyn LanguageModel>> = Vec::new();

    for kind in ProviderKind::ALL {
        let settings = config.provider(kind);
        if !settings.enabled {
            info!(provider = kind.id(), "Provider disabled");
            continue;
        }

        let provider = match kind {
            ProviderKind::Google => google(&settings, observer.clone())?,
            ProviderKind::Grok | ProviderKind::GptOss | ProviderKind::SonnetFree => {
                bespoke(kind, &settings, config.stream_word_delay)?
            }
            _ => openai_compatible(kind, &settings)?,
        };

        match provider {
            Some(provider) => {
                info!(
                    provider = provider.id(),
                    models = provider.models().len(),
                    has_credential = provider.has_credential(),
                    "Registered provider"
                );
                providers.push(provider);
            }
            None => info!(provider = kind.id(), "Provider not configured, skipping"),
        }
    }

    let catalog = Catalog::new(
        providers,
        &config.display_order,
        config.search_variants.clone(),
    );
    if catalog.is_empty() {
        warn!("No providers registered; every chat request will fail");
    }
    Ok(catalog)
}

fn google(
    settings: &ProviderSettings,
    observer: Option<AttemptObserver>,
) -> Result<Option<Arc<dyn LanguageModel>>, GatewayError> {
    let Some(keys) = &settings.api_key else {
        return Ok(None);
    };
    let pool = CredentialPool::from_secret(keys);
    if pool.is_empty() {
        warn!(provider = "google", "API key list holds no usable keys, skipping");
        return Ok(None);
    }
    info!(provider = "google", keys = pool.len(), "Loaded credential pool");

    let mut google = GoogleConfig::with_pool(pool).with_timeout(settings.timeout);
    if let Some(base_url) = &settings.base_url {
        google = google.with_base_url(base_url.as_str());
    }
    if let Some(observer) = observer {
        google = google.with_observer(observer);
    }
    Ok(Some(Arc::new(GoogleProvider::new(google)?)))
}

fn bespoke(
    kind: ProviderKind,
    settings: &ProviderSettings,
    word_delay: Duration,
) -> Result<Option<Arc<dyn LanguageModel>>, GatewayError> {
    let Some(url) = &settings.base_url else {
        return Ok(None);
    };
    let config = BespokeConfig::new(kind, url)?
        .with_timeout(settings.timeout)
        .with_word_delay(word_delay);
    Ok(Some(Arc::new(BespokeProvider::new(config)?)))
}

fn openai_compatible(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> Result<Option<Arc<dyn LanguageModel>>, GatewayError> {
    let Some(base_url) = settings
        .base_url
        .as_deref()
        .or_else(|| default_base_url(kind))
    else {
        return Ok(None);
    };
    let mut config = OpenAICompatibleConfig::new(kind, base_url).with_timeout(settings.timeout);
    if let Some(key) = &settings.api_key {
        config = config.with_api_key(key.clone());
    }
    Ok(Some(Arc::new(OpenAICompatibleProvider::new(config)?)))
}
