use super::traits::Provider;
use crate::error::EngineError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Admin-surface view of one registered provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub display_name: String,
    pub supported_models: Vec<String>,
    /// Whether the adapter currently has the credentials to be attempted.
    pub available: bool,
}

/// Catalogue of backend adapters.
///
/// Adapters are immutable once registered; the registry itself accepts
/// runtime registration (custom plant-local endpoints), so lookups go
/// through an `RwLock`. Re-registering an id replaces the adapter, which is
/// how operators rotate credentials without a restart.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, provider: Arc<dyn Provider>) {
        let id = provider.id().to_string();
        let mut providers = self.providers.write().expect("provider registry lock poisoned");
        if providers.insert(id.clone(), provider).is_some() {
            tracing::debug!(provider = id.as_str(), "replaced existing provider registration");
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Provider>, EngineError> {
        let providers = self.providers.read().expect("provider registry lock poisoned");
        providers
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::Configuration(format!("unknown provider: {id}")))
    }

    pub fn contains(&self, id: &str) -> bool {
        let providers = self.providers.read().expect("provider registry lock poisoned");
        providers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        let providers = self.providers.read().expect("provider registry lock poisoned");
        providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted by id for stable admin output.
    pub fn list(&self) -> Vec<ProviderInfo> {
        let providers = self.providers.read().expect("provider registry lock poisoned");
        let mut infos: Vec<ProviderInfo> = providers
            .values()
            .map(|provider| ProviderInfo {
                id: provider.id().to_string(),
                display_name: provider.display_name().to_string(),
                supported_models: provider.supported_models().to_vec(),
                available: provider.is_configured(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
