use crate::engine::pipeline::{FilterChains, Pipeline, PipelineDefaults};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Generic fallback API key used for any provider without its own.
    pub api_key: Option<String>,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Pipelines declared in config. When empty, the built-in defaults
    /// (component-generation, layout-analysis) are registered instead.
    #[serde(default, rename = "pipeline")]
    pub pipelines: Vec<PipelineConfig>,
}

// ── Providers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
    /// OpenAI-compatible backends: named specs (groq, mistral, deepseek)
    /// or arbitrary endpoints with an explicit base_url.
    #[serde(default)]
    pub compatible: Vec<CompatibleProviderConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Preferred-first model list; empty means the adapter's defaults.
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibleProviderConfig {
    pub id: String,
    pub display_name: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

// ── Result cache ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a memoized result stays valid (default: 300)
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Size bound; oldest entries evicted first past it (default: 500)
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// Period of the background expiry sweep (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Never memoize calls sampling at temperature > 0 (default: false,
    /// matching replay semantics)
    #[serde(default)]
    pub skip_sampling: bool,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    500
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            skip_sampling: false,
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Gateway port (default: 7610)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    7610
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

// ── Pipelines ─────────────────────────────────────────────────────

/// TOML-friendly flat pipeline declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub id: String,
    pub providers: Vec<String>,
    #[serde(default)]
    pub pre_process: Vec<String>,
    #[serde(default)]
    pub post_process: Vec<String>,
    #[serde(default)]
    pub on_error: Vec<String>,
    #[serde(default)]
    pub system_prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl PipelineConfig {
    pub fn into_pipeline(self) -> Pipeline {
        let base = PipelineDefaults::default();
        Pipeline {
            id: self.id,
            provider_preference: self.providers,
            filters: FilterChains {
                pre_process: self.pre_process,
                post_process: self.post_process,
                on_error: self.on_error,
            },
            system_prompt: self.system_prompt,
            defaults: PipelineDefaults {
                temperature: self.temperature.unwrap_or(base.temperature),
                max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
                timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            },
        }
    }
}
