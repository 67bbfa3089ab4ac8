// ── Core state machine ──────────────────────────────────────────────────────
pub mod cache;
pub mod context;
pub mod executor;
pub mod metrics;
pub mod pipeline;

// ── Filters ─────────────────────────────────────────────────────────────────
pub mod builtin;
pub mod filter;

// ── Re-exports ──────────────────────────────────────────────────────────────
pub use builtin::register_builtin_filters;
pub use cache::{ResultCache, fingerprint};
pub use context::{CallOptions, ContextSnapshot, ExecutionContext, ExecutionResult};
pub use executor::{CachePolicy, ExecutionEngine};
pub use filter::{
    ErrorFilter, FallbackDecision, FilterEntry, FilterInfo, FilterKind, FilterRegistry,
    PostProcessFilter, PreProcessFilter,
};
pub use metrics::{MetricSnapshot, PerformanceMetric, PerformanceTracker};
pub use pipeline::{FilterChains, Pipeline, PipelineDefaults, PipelineRegistry};

use crate::config::Config;
use crate::error::{EngineError, ForgeError};
use crate::llm::{
    AnthropicProvider, GeminiProvider, OpenAiCompatibleProvider, OpenAiProvider, ProviderRegistry,
};
use std::sync::Arc;
use std::time::Duration;

const COMPONENT_GENERATION_PROMPT: &str = "\
You generate SCADA/HMI component definitions for an industrial layout \
studio. Reply with a short explanation followed by one fenced ```json block \
containing an array of component objects. Each object carries \"type\", \
\"label\", \"position\" {x, y}, and \"properties\". Use ISA-101 naming for \
equipment labels.";

const LAYOUT_ANALYSIS_PROMPT: &str = "\
You analyze SCADA/HMI layout descriptions and extracted P&ID text for an \
industrial layout studio. Identify equipment, flow paths, and alarm points, \
and point out layout problems an operator console reviewer would flag.";

/// Resolve an API key for a provider.
///
/// Resolution order:
/// 1. Explicit key from the provider's config section
/// 2. Provider-specific environment variable
/// 3. Generic config key, then `PANELFORGE_API_KEY`
pub fn resolve_api_key(name: &str, explicit: Option<&str>, generic: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    let env_candidates: &[&str] = match name {
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "gemini" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "groq" => &["GROQ_API_KEY"],
        "mistral" => &["MISTRAL_API_KEY"],
        "deepseek" => &["DEEPSEEK_API_KEY"],
        _ => &[],
    };

    for env_var in env_candidates {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    if let Some(key) = generic.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    if let Ok(value) = std::env::var("PANELFORGE_API_KEY") {
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

/// Assemble a ready-to-serve engine from config: adapters for every known
/// backend, the built-in filters, and either the config-declared pipelines
/// or the built-in defaults.
pub fn build_engine(config: &Config) -> Result<ExecutionEngine, ForgeError> {
    let providers = Arc::new(ProviderRegistry::new());
    register_default_providers(&providers, config);

    let filters = Arc::new(FilterRegistry::new());
    register_builtin_filters(&filters);

    let pipelines = Arc::new(PipelineRegistry::new());
    register_config_pipelines(&pipelines, &providers, &filters, config)?;

    let cache = Arc::new(ResultCache::new(
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.max_entries,
    ));
    let tracker = Arc::new(PerformanceTracker::new());

    Ok(ExecutionEngine::new(
        providers,
        filters,
        pipelines,
        tracker,
        cache,
        CachePolicy {
            skip_sampling: config.cache.skip_sampling,
        },
    ))
}

fn register_default_providers(registry: &ProviderRegistry, config: &Config) {
    let generic = config.api_key.as_deref();

    let anthropic = &config.providers.anthropic;
    registry.register(Arc::new(AnthropicProvider::with_base_url(
        resolve_api_key("anthropic", anthropic.api_key.as_deref(), generic),
        anthropic.base_url.as_deref(),
        anthropic.models.clone(),
    )));

    let openai = &config.providers.openai;
    registry.register(Arc::new(OpenAiProvider::with_base_url(
        resolve_api_key("openai", openai.api_key.as_deref(), generic),
        openai.base_url.as_deref(),
        openai.models.clone(),
    )));

    let gemini = &config.providers.gemini;
    registry.register(Arc::new(GeminiProvider::with_base_url(
        resolve_api_key("gemini", gemini.api_key.as_deref(), generic),
        gemini.base_url.as_deref(),
        gemini.models.clone(),
    )));

    for compat in &config.providers.compatible {
        let api_key = resolve_api_key(&compat.id, compat.api_key.as_deref(), generic);
        let provider = if let Some(provider) =
            OpenAiCompatibleProvider::from_spec(&compat.id, api_key.clone(), compat.models.clone())
        {
            provider
        } else if let Some(base_url) = &compat.base_url {
            OpenAiCompatibleProvider::new(
                compat.id.clone(),
                compat
                    .display_name
                    .clone()
                    .unwrap_or_else(|| compat.id.clone()),
                base_url,
                api_key,
                compat.models.clone(),
            )
        } else {
            tracing::warn!(
                provider = compat.id.as_str(),
                "compatible provider is neither a known spec nor carries a base_url, skipping"
            );
            continue;
        };
        registry.register(Arc::new(provider));
    }
}

fn register_config_pipelines(
    pipelines: &PipelineRegistry,
    providers: &ProviderRegistry,
    filters: &FilterRegistry,
    config: &Config,
) -> Result<(), EngineError> {
    if config.pipelines.is_empty() {
        return register_default_pipelines(pipelines, providers, filters);
    }
    for declared in &config.pipelines {
        pipelines.register(declared.clone().into_pipeline(), providers, filters)?;
    }
    Ok(())
}

fn register_default_pipelines(
    pipelines: &PipelineRegistry,
    providers: &ProviderRegistry,
    filters: &FilterRegistry,
) -> Result<(), EngineError> {
    let preference: Vec<String> = ["anthropic", "openai", "gemini"]
        .iter()
        .filter(|id| providers.contains(id))
        .map(ToString::to_string)
        .collect();

    pipelines.register(
        Pipeline {
            id: "component-generation".to_string(),
            provider_preference: preference.clone(),
            filters: FilterChains {
                pre_process: vec!["redact-secrets".to_string()],
                post_process: vec![
                    "strip-reasoning".to_string(),
                    "extract-components".to_string(),
                ],
                on_error: vec!["halt-on-invalid-request".to_string()],
            },
            system_prompt: COMPONENT_GENERATION_PROMPT.to_string(),
            defaults: PipelineDefaults {
                temperature: 0.2,
                max_tokens: 4096,
                timeout_ms: 60_000,
            },
        },
        providers,
        filters,
    )?;

    pipelines.register(
        Pipeline {
            id: "layout-analysis".to_string(),
            provider_preference: preference,
            filters: FilterChains {
                pre_process: vec!["redact-secrets".to_string()],
                post_process: vec!["strip-reasoning".to_string()],
                on_error: vec!["halt-on-invalid-request".to_string()],
            },
            system_prompt: LAYOUT_ANALYSIS_PROMPT.to_string(),
            defaults: PipelineDefaults {
                temperature: 0.4,
                max_tokens: 4096,
                timeout_ms: 60_000,
            },
        },
        providers,
        filters,
    )?;

    Ok(())
}
