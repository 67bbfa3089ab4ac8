use super::http_client::build_provider_client;
use super::scrub::{api_error, transport_error};
use super::traits::{Provider, SamplingParams};
use super::types::{CanonicalResponse, ChatMessage, MessageRole, TokenUsage};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER_ID: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

fn default_models() -> Vec<String> {
    vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]
}

/// Native OpenAI chat-completions adapter.
pub struct OpenAiProvider {
    api_key: Option<String>,
    completions_url: String,
    models: Vec<String>,
    client: Client,
}

// ─── Wire format ────────────────────────────────────────────────────────────
//
// The chat-completions shape is shared with every OpenAI-compatible backend,
// so the types are crate-visible for the compatible adapter.

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionsResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<WireUsage>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

pub(crate) fn build_request(
    messages: &[ChatMessage],
    model: &str,
    params: SamplingParams,
) -> ChatCompletionsRequest {
    let wire_messages = messages
        .iter()
        .map(|message| WireMessage {
            role: match message.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            },
            content: message.content.clone(),
        })
        .collect();

    ChatCompletionsRequest {
        model: model.to_string(),
        messages: wire_messages,
        temperature: params.temperature,
        max_tokens: params.max_tokens,
    }
}

pub(crate) fn parse_response(
    provider: &str,
    response: ChatCompletionsResponse,
    requested_model: &str,
) -> Result<CanonicalResponse, ProviderError> {
    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(ProviderError::MalformedResponse {
            provider: provider.to_string(),
            message: "response carried no choices with content".to_string(),
        });
    }

    let mut canonical = CanonicalResponse::new(
        content,
        response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    );
    if let Some(usage) = response.usage {
        canonical = canonical.with_usage(TokenUsage::new(usage.prompt_tokens, usage.completion_tokens));
    }
    Ok(canonical)
}

// ─── Adapter ────────────────────────────────────────────────────────────────

impl OpenAiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, None, Vec::new())
    }

    pub fn with_base_url(
        api_key: Option<String>,
        base_url: Option<&str>,
        models: Vec<String>,
    ) -> Self {
        let base = base_url
            .map_or(DEFAULT_BASE_URL, |u| u.trim_end_matches('/'))
            .to_string();
        let models = if models.is_empty() {
            default_models()
        } else {
            models
        };
        Self {
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            completions_url: format!("{base}/v1/chat/completions"),
            models,
            client: build_provider_client(),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "OpenAI"
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
            provider: PROVIDER_ID.to_string(),
        })?;

        let request = build_request(messages, model, params);
        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER_ID, &e))?;

        if !response.status().is_success() {
            return Err(api_error(PROVIDER_ID, response).await);
        }

        let body: ChatCompletionsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;
        parse_response(PROVIDER_ID, body, model)
    }
}
