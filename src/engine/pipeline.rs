use super::filter::FilterRegistry;
use crate::error::EngineError;
use crate::llm::ProviderRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Filter ids per chain position, applied in declared order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterChains {
    #[serde(default)]
    pub pre_process: Vec<String>,
    #[serde(default)]
    pub post_process: Vec<String>,
    #[serde(default)]
    pub on_error: Vec<String>,
}

impl FilterChains {
    fn referenced_ids(&self) -> impl Iterator<Item = &String> {
        self.pre_process
            .iter()
            .chain(&self.post_process)
            .chain(&self.on_error)
    }
}

/// Default call options a pipeline applies when the caller sets none.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineDefaults {
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

/// A named orchestration configuration: ordered provider preference, filter
/// chains, system prompt, and default options. Immutable once registered;
/// replaced wholesale on hot reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub provider_preference: Vec<String>,
    #[serde(default)]
    pub filters: FilterChains,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub defaults: PipelineDefaults,
}

/// Catalogue of pipelines. Registration validates every referenced id so a
/// bad configuration surfaces immediately rather than mid-call.
pub struct PipelineRegistry {
    pipelines: RwLock<HashMap<String, Arc<Pipeline>>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
        }
    }

    /// Validate and register (or replace) a pipeline.
    pub fn register(
        &self,
        pipeline: Pipeline,
        providers: &ProviderRegistry,
        filters: &FilterRegistry,
    ) -> Result<(), EngineError> {
        if pipeline.id.trim().is_empty() {
            return Err(EngineError::Configuration(
                "pipeline id must not be empty".to_string(),
            ));
        }
        if pipeline.provider_preference.is_empty() {
            return Err(EngineError::Configuration(format!(
                "pipeline {} declares no providers",
                pipeline.id
            )));
        }
        for provider_id in &pipeline.provider_preference {
            if !providers.contains(provider_id) {
                return Err(EngineError::Configuration(format!(
                    "pipeline {} references unknown provider {provider_id}",
                    pipeline.id
                )));
            }
        }
        for filter_id in pipeline.filters.referenced_ids() {
            if !filters.contains(filter_id) {
                return Err(EngineError::Configuration(format!(
                    "pipeline {} references unknown filter {filter_id}",
                    pipeline.id
                )));
            }
        }
        // Kind agreement per chain, so a post filter can never land in a
        // pre chain and fail at call time.
        filters.pre_chain(&pipeline.filters.pre_process)?;
        filters.post_chain(&pipeline.filters.post_process)?;
        filters.error_chain(&pipeline.filters.on_error)?;

        let id = pipeline.id.clone();
        let mut pipelines = self.pipelines.write().expect("pipeline registry lock poisoned");
        if pipelines.insert(id.clone(), Arc::new(pipeline)).is_some() {
            tracing::info!(pipeline = id.as_str(), "replaced pipeline registration");
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<Pipeline>, EngineError> {
        let pipelines = self.pipelines.read().expect("pipeline registry lock poisoned");
        pipelines
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::PipelineNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        let pipelines = self.pipelines.read().expect("pipeline registry lock poisoned");
        pipelines.contains_key(id)
    }

    /// Sorted by id for stable admin output.
    pub fn list(&self) -> Vec<Pipeline> {
        let pipelines = self.pipelines.read().expect("pipeline registry lock poisoned");
        let mut all: Vec<Pipeline> = pipelines.values().map(|p| (**p).clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
