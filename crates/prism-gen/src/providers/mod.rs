//! Provider registry
//!
//! Maps provider names to concrete implementations.

pub mod fal;
pub mod gemini;
mod http;
pub mod mock;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::PrismConfig;
use crate::provider::{GenerationProvider, ProviderError};

/// Create a provider by name with configuration
pub fn create_provider(
    name: &str,
    config: &PrismConfig,
) -> Result<Arc<dyn GenerationProvider>, ProviderError> {
    match name {
        "mock" => Ok(Arc::new(mock::MockProvider::new())),
        "fal" => Ok(Arc::new(fal::FalProvider::from_config(config)?)),
        "gemini" => Ok(Arc::new(gemini::GeminiProvider::from_config(config)?)),
        _ => Err(ProviderError::Unconfigured(format!(
            "{} (available: {})",
            name,
            available_providers().join(", ")
        ))),
    }
}

/// List all provider names this build knows about
pub fn available_providers() -> Vec<&'static str> {
    vec!["mock", "fal", "gemini"]
}

/// Providers keyed by their registry name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn GenerationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every enabled provider that has credentials, plus `mock`
    pub fn from_config(config: &PrismConfig) -> Self {
        let mut registry = Self::new();
        for name in available_providers() {
            if !config.is_enabled(name) {
                continue;
            }
            match create_provider(name, config) {
                Ok(provider) => registry.register(provider),
                Err(e) => tracing::debug!(provider = name, error = %e, "provider not registered"),
            }
        }
        registry
    }

    /// Register a provider under its own name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn GenerationProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerationProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn test_create_unknown_provider() {
        let config = PrismConfig::default();
        assert!(matches!(
            create_provider("midjourney", &config),
            Err(ProviderError::Unconfigured(_))
        ));
    }

    #[test]
    fn test_registry_from_config_skips_unkeyed_and_disabled() {
        let mut config = PrismConfig::default();
        config.providers.insert(
            "fal".to_string(),
            ProviderConfig {
                api_key: Some("fal-key".to_string()),
                api_url: None,
                enabled: true,
            },
        );
        config.providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                api_key: Some("gm-key".to_string()),
                api_url: None,
                enabled: false,
            },
        );

        let registry = ProviderRegistry::from_config(&config);
        assert_eq!(registry.names(), vec!["fal", "mock"]);
        assert!(!registry.contains("gemini"));
    }

    #[test]
    fn test_register_uses_provider_name() {
        let registry =
            ProviderRegistry::new().with(Arc::new(mock::MockProvider::named("alpha")));
        assert!(registry.contains("alpha"));
        assert_eq!(registry.get("alpha").unwrap().name(), "alpha");
        assert!(registry.get("beta").is_none());
    }
}
