//! Mapping between internal model ids and user-facing display names.

use gateway_core::ModelDescriptor;
use std::collections::BTreeMap;

/// Display names keyed by internal model id, in catalog order.
///
/// The forward map is the only stored direction; reverse lookups scan it,
/// so a display name shared by several models resolves to the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayNames {
    forward: Vec<(String, String)>,
}

impl DisplayNames {
    /// Build the map from catalog entries; a repeated internal id keeps its first entry
    pub fn from_descriptors<'a>(models: impl IntoIterator<Item = &'a ModelDescriptor>) -> Self {
        let mut forward: Vec<(String, String)> = Vec::new();
        for model in models {
            if forward.iter().all(|(id, _)| *id != model.internal_id) {
                forward.push((model.internal_id.clone(), model.display_name.clone()));
            }
        }
        Self { forward }
    }

    /// Display name for an internal id
    #[must_use]
    pub fn display_name_for(&self, internal_id: &str) -> Option<&str> {
        self.forward
            .iter()
            .find(|(id, _)| id == internal_id)
            .map(|(_, name)| name.as_str())
    }

    /// Internal id for a display name
    #[must_use]
    pub fn internal_id_for(&self, display_name: &str) -> Option<&str> {
        self.forward
            .iter()
            .filter(|(_, name)| name.as_str() == display_name)
            .map(|(id, _)| id.as_str())
            .last()
    }

    /// Display names used by more than one model
    #[must_use]
    pub fn duplicate_display_names(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, name) in &self.forward {
            *counts.entry(name.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| name)
            .collect()
    }

    /// Iterate over `(internal_id, display_name)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
