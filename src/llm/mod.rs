// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod http_client;
pub mod registry;
pub mod scrub;
pub mod traits;
pub mod types;

// ── Provider implementations ────────────────────────────────────────────────
pub mod anthropic;
pub mod compatible;
pub mod gemini;
pub mod openai;

// ── Infrastructure re-exports ───────────────────────────────────────────────
pub use http_client::build_provider_client;
pub use registry::{ProviderInfo, ProviderRegistry};
pub use scrub::{sanitize_api_error, scrub_secret_patterns};
pub use traits::{Provider, SamplingParams, split_system};
pub use types::{CanonicalResponse, ChatMessage, MessageRole, TokenUsage};

// ── Provider re-exports ─────────────────────────────────────────────────────
pub use anthropic::AnthropicProvider;
pub use compatible::{OpenAiCompatibleProvider, compatible_provider_spec};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
