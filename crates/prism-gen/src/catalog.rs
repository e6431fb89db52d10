//! Model catalog
//!
//! The static list of models a comparison fans out to. Each entry names the
//! provider that serves it and what one generation costs in credits.

use prism_core::PrismError;
use serde::{Deserialize, Serialize};

/// One comparable model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider model id, passed through to the adapter untouched
    pub model: String,
    pub label: String,
    pub style: String,
    #[serde(rename = "cost")]
    pub cost_credits: u32,
    /// Registry key of the provider that serves this model
    pub provider: String,
}

impl ModelConfig {
    pub fn new(model: &str, label: &str, style: &str, cost_credits: u32, provider: &str) -> Self {
        Self {
            model: model.to_string(),
            label: label.to_string(),
            style: style.to_string(),
            cost_credits,
            provider: provider.to_string(),
        }
    }
}

/// Default comparison set, five models with distinct styles
pub fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("fal-ai/flux-pro/v1.1", "Flux Pro", "Photorealistic", 4, "fal"),
        ModelConfig::new("fal-ai/flux/dev", "Flux Dev", "Balanced", 2, "fal"),
        ModelConfig::new("fal-ai/recraft-v3", "Recraft", "Design", 3, "fal"),
        ModelConfig::new("fal-ai/ideogram/v2", "Ideogram", "Typography", 3, "fal"),
        ModelConfig::new("gemini-2.5-flash-image", "Gemini", "Creative", 3, "gemini"),
    ]
}

/// Ordered, immutable set of model configs
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelConfig>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: default_models(),
        }
    }
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelConfig>) -> Self {
        Self { models }
    }

    /// Built-in models with `overrides` replacing same-id entries and
    /// appending new ones
    pub fn with_overrides(overrides: impl IntoIterator<Item = ModelConfig>) -> Self {
        let mut catalog = Self::default();
        for model in overrides {
            match catalog.models.iter_mut().find(|m| m.model == model.model) {
                Some(existing) => *existing = model,
                None => catalog.models.push(model),
            }
        }
        catalog
    }

    pub fn get(&self, model: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.model == model)
    }

    pub fn all(&self) -> &[ModelConfig] {
        &self.models
    }

    /// Resolve a list of model ids, failing on the first unknown one
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<ModelConfig>, String> {
        ids.iter()
            .map(|id| self.get(id).cloned().ok_or_else(|| id.clone()))
            .collect()
    }

    /// Sum of credit costs across `models`; an unrepresentable total is
    /// invalid input rather than a wrapped small number
    pub fn total_cost(models: &[ModelConfig]) -> prism_core::Result<u32> {
        models
            .iter()
            .try_fold(0u32, |total, m| total.checked_add(m.cost_credits))
            .ok_or_else(|| {
                PrismError::InvalidInput("total credit cost of the batch overflows".to_string())
            })
    }
}
