use super::http_client::build_provider_client;
use super::openai::{build_request, parse_response, ChatCompletionsResponse};
use super::scrub::{api_error, transport_error};
use super::traits::{Provider, SamplingParams};
use super::types::{CanonicalResponse, ChatMessage};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;

/// Well-known OpenAI-compatible backends: `(display_name, base_url,
/// default_models)` keyed by registry id.
pub fn compatible_provider_spec(name: &str) -> Option<(&'static str, &'static str, &'static [&'static str])> {
    let spec = match name {
        "groq" => (
            "Groq",
            "https://api.groq.com/openai",
            &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"] as &[&str],
        ),
        "mistral" => (
            "Mistral",
            "https://api.mistral.ai",
            &["mistral-large-latest", "mistral-small-latest"] as &[&str],
        ),
        "deepseek" => (
            "DeepSeek",
            "https://api.deepseek.com",
            &["deepseek-chat", "deepseek-reasoner"] as &[&str],
        ),
        _ => return None,
    };
    Some(spec)
}

/// Adapter for any backend speaking the OpenAI chat-completions wire
/// format behind a different base URL: the named specs above plus
/// user-supplied `custom:<base_url>` endpoints.
pub struct OpenAiCompatibleProvider {
    id: String,
    display_name: String,
    api_key: Option<String>,
    completions_url: String,
    models: Vec<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        base_url: &str,
        api_key: Option<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            completions_url: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            models,
            client: build_provider_client(),
        }
    }

    /// Build an adapter from a well-known spec id (see
    /// [`compatible_provider_spec`]). Returns `None` for unknown ids.
    pub fn from_spec(name: &str, api_key: Option<String>, models: Vec<String>) -> Option<Self> {
        let (display_name, base_url, default_models) = compatible_provider_spec(name)?;
        let models = if models.is_empty() {
            default_models.iter().map(ToString::to_string).collect()
        } else {
            models
        };
        Some(Self::new(name, display_name, base_url, api_key, models))
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supported_models(&self) -> &[String] {
        &self.models
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        params: SamplingParams,
    ) -> Result<CanonicalResponse, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ProviderError::NotConfigured {
            provider: self.id.clone(),
        })?;

        let request = build_request(messages, model, params);
        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.id, &e))?;

        if !response.status().is_success() {
            return Err(api_error(&self.id, response).await);
        }

        let body: ChatCompletionsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.id.clone(),
                    message: e.to_string(),
                })?;
        parse_response(&self.id, body, model)
    }
}
