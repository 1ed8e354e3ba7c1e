//! Provider registry for managing available providers.

use std::collections::HashMap;
use std::sync::Arc;

use condense_core::Config;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::traits::Provider;

/// Registry of available text-generation providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: None,
        }
    }

    /// Initialize registry with all available providers based on configuration.
    ///
    /// API keys come from the config first, then from `ANTHROPIC_API_KEY` /
    /// `OPENAI_API_KEY`. An OpenAI-compatible endpoint with a `base_url` is
    /// registered even without a key (local servers usually don't need one).
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        let anthropic_config = config.providers.anthropic.clone().unwrap_or_default();
        let anthropic_key = anthropic_config
            .resolve_api_key()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());

        if let Some(api_key) = anthropic_key {
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(ref base_url) = anthropic_config.base_url {
                provider = provider.with_base_url(base_url);
            }
            if let Some(ref model) = anthropic_config.default_model {
                provider = provider.with_default_model(model);
            }
            registry.register(Arc::new(provider));
        }

        let openai_config = config.providers.openai.clone().unwrap_or_default();
        let openai_key = openai_config
            .resolve_api_key()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        let openai_base = openai_config
            .base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok());

        if openai_key.is_some() || openai_base.is_some() {
            let mut provider = OpenAIProvider::new(openai_key.unwrap_or_default());
            if let Some(base_url) = openai_base {
                provider = provider.with_base_url(base_url);
            }
            if let Some(ref model) = openai_config.default_model {
                provider = provider.with_default_model(model);
            }
            registry.register(Arc::new(provider));
        }

        let preferred = config
            .providers
            .default_provider
            .as_deref()
            .unwrap_or(&config.general.provider);
        if !registry.set_default(preferred) {
            tracing::debug!(
                "Preferred provider '{}' not available, using {:?}",
                preferred,
                registry.default_provider
            );
        }

        registry
    }

    /// Register a provider.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let id = provider.id().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(id.clone());
        }
        self.providers.insert(id, provider);
    }

    /// Get a provider by ID.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.default_provider.as_ref().and_then(|id| self.get(id))
    }

    /// Set the default provider.
    pub fn set_default(&mut self, id: &str) -> bool {
        if self.providers.contains_key(id) {
            self.default_provider = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// List all registered providers.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
