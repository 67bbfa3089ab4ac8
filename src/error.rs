use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `PanelForge`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ForgeError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Orchestration engine ────────────────────────────────────────────
    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Provider errors ────────────────────────────────────────────────────────

/// One backend attempt failing. Every variant except [`InvalidRequest`]
/// feeds the engine's fallback loop; `InvalidRequest` marks caller input
/// that no amount of provider switching will fix.
///
/// [`InvalidRequest`]: ProviderError::InvalidRequest
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} rate-limited")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    #[error("provider {provider} authentication failed: {message}")]
    Auth { provider: String, message: String },

    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("provider {provider} returned a malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("provider {provider} is not configured")]
    NotConfigured { provider: String },

    #[error("invalid request rejected by provider {provider}: {message}")]
    InvalidRequest { provider: String, message: String },
}

impl ProviderError {
    /// Provider id the failure originated from.
    pub fn provider(&self) -> &str {
        match self {
            Self::Request { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Auth { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::NotConfigured { provider }
            | Self::InvalidRequest { provider, .. } => provider,
        }
    }

    /// `true` when the failure is the caller's input, not a backend outage.
    /// Switching providers cannot fix these.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. })
    }
}

// ─── Engine errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown provider/filter/pipeline id, or a pipeline that references
    /// one. Fatal, never retried.
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("pipeline not found: {0}")]
    PipelineNotFound(String),

    /// Caller-supplied input invalid. Terminal, never triggers fallback.
    #[error("validation: {0}")]
    Validation(String),

    /// A filter failed while transforming a call. Terminal: the provider
    /// call itself may have succeeded, so re-dispatching would double-bill.
    #[error("filter {filter} failed: {message}")]
    Filter { filter: String, message: String },

    /// A single provider failure promoted to terminal by an error filter.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("all providers failed for pipeline {pipeline}: {last_error}")]
    AllProvidersFailed {
        pipeline: String,
        attempted: Vec<String>,
        last_error: String,
    },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ForgeError>;
