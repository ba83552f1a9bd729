//! Immutable model catalog.
//!
//! Built once at startup and shared by `Arc` with request handlers. Holds
//! the adapters in presentation order, the flattened model list and the
//! display-name map, and resolves request model names to an adapter.

use crate::context::context_char_limit;
use crate::display::DisplayNames;
use crate::search::is_search_query;
use gateway_core::{GatewayError, LanguageModel, ModelDescriptor, ProviderProfile};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of resolving a request model name
#[derive(Clone)]
pub struct Resolution {
    /// Adapter serving the model
    pub provider: Arc<dyn LanguageModel>,
    /// Resolved catalog entry
    pub descriptor: ModelDescriptor,
    /// The request was rerouted to a search-augmented variant
    pub search_augmented: bool,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("provider", &self.provider.id())
            .field("model", &self.descriptor.internal_id)
            .field("search_augmented", &self.search_augmented)
            .finish()
    }
}

/// Model catalog across all registered providers
pub struct Catalog {
    providers: Vec<Arc<dyn LanguageModel>>,
    profiles: Vec<ProviderProfile>,
    models: Vec<ModelDescriptor>,
    /// internal id -> (index into `models`, index into `providers`)
    index: HashMap<String, (usize, usize)>,
    display: DisplayNames,
    search_variants: BTreeMap<String, String>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("providers", &self.profiles)
            .field("models", &self.models.len())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Build a catalog from constructed adapters.
    ///
    /// Providers are ordered by their position in `display_order` (unlisted
    /// ones last, keeping their given order), then credentialed providers
    /// ahead of the rest. When two providers expose the same internal id the
    /// first in that order keeps it.
    pub fn new(
        providers: Vec<Arc<dyn LanguageModel>>,
        display_order: &[String],
        search_variants: BTreeMap<String, String>,
    ) -> Self {
        let rank = |id: &str| display_order.iter().position(|p| p == id);

        let mut providers = providers;
        providers.sort_by_key(|p| (rank(p.id()).unwrap_or(usize::MAX), !p.has_credential()));

        let profiles = providers
            .iter()
            .map(|p| ProviderProfile {
                provider_id: p.id().to_string(),
                display_name: p.display_name().to_string(),
                has_credential: p.has_credential(),
                order_rank: rank(p.id()),
            })
            .collect();

        let mut models = Vec::new();
        let mut index = HashMap::new();
        for (provider_idx, provider) in providers.iter().enumerate() {
            for model in provider.models() {
                if let Some(&(_, owner)) = index.get(&model.internal_id) {
                    let owner: &Arc<dyn LanguageModel> = &providers[owner];
                    warn!(
                        model = %model.internal_id,
                        provider = provider.id(),
                        kept = owner.id(),
                        "Duplicate model id, keeping the earlier provider"
                    );
                    continue;
                }
                let mut model = model.clone();
                if model.context_char_limit == 0 {
                    model.context_char_limit = context_char_limit(&model.internal_id);
                }
                index.insert(model.internal_id.clone(), (models.len(), provider_idx));
                models.push(model);
            }
        }

        let display = DisplayNames::from_descriptors(&models);
        for name in display.duplicate_display_names() {
            warn!(display_name = name, "Display name shared by several models");
        }

        Self {
            providers,
            profiles,
            models,
            index,
            display,
            search_variants,
        }
    }

    /// Models in presentation order
    #[must_use]
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Provider profiles in presentation order
    #[must_use]
    pub fn provider_profiles(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    /// Registered adapters in presentation order
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn LanguageModel>] {
        &self.providers
    }

    /// Display-name map
    #[must_use]
    pub fn display_names(&self) -> &DisplayNames {
        &self.display
    }

    /// Whether no model is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Look up a model by internal id or display name
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.internal_id(name)
            .and_then(|id| self.index.get(id))
            .map(|&(model_idx, _)| &self.models[model_idx])
    }

    fn internal_id<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.index.contains_key(name) {
            Some(name)
        } else {
            self.display.internal_id_for(name)
        }
    }

    /// Resolve a request model name to its adapter.
    ///
    /// `name` may be an internal id or a display name. When the model has a
    /// registered search variant and `user_text` reads as a search query, the
    /// variant is returned instead.
    ///
    /// # Errors
    /// Returns `ModelNotFound` if the name matches no catalog entry
    pub fn resolve(&self, name: &str, user_text: Option<&str>) -> Result<Resolution, GatewayError> {
        let internal = self
            .internal_id(name)
            .ok_or_else(|| GatewayError::model_not_found(name))?;

        let variant = self
            .search_variants
            .get(internal)
            .filter(|variant| self.index.contains_key(variant.as_str()))
            .filter(|_| user_text.is_some_and(is_search_query));

        let (id, search_augmented) = match variant {
            Some(variant) => (variant.as_str(), true),
            None => (internal, false),
        };

        let &(model_idx, provider_idx) = self
            .index
            .get(id)
            .ok_or_else(|| GatewayError::model_not_found(name))?;

        let resolution = Resolution {
            provider: Arc::clone(&self.providers[provider_idx]),
            descriptor: self.models[model_idx].clone(),
            search_augmented,
        };
        debug!(
            requested = name,
            model = %resolution.descriptor.internal_id,
            provider = resolution.provider.id(),
            search_augmented,
            "Resolved model"
        );
        Ok(resolution)
    }
}
