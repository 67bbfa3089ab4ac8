use super::http_client::build_provider_client;
use super::scrub::{api_error, transport_error};
use super::traits::{Provider, SamplingParams, split_system};
use super::types::{CanonicalResponse, ChatMessage, MessageRole, TokenUsage};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER_ID: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

fn default_models() -> Vec<String> {
    vec![
        "claude-sonnet-4-5".to_string(),
        "claude-haiku-4-5".to_string(),
    ]
}

/// Native Anthropic messages API adapter.
pub struct AnthropicProvider {
    api_key: Option<String>,
    messages_url: String,
    models: Vec<String>,
    client: Client,
}

// ─── Wire format ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    usage: Option<WireUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

// ─── Adapter ────────────────────────────────────────────────────────────────

impl AnthropicProvider {
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
            messages_url: format!("{base}/v1/messages"),
            models,
            client: build_provider_client(),
        }
    }

    fn build_request(
        messages: &[ChatMessage],
        model: &str,
        params: SamplingParams,
    ) -> MessagesRequest {
        let (system, turns) = split_system(messages);
        let wire_messages = turns
            .iter()
            .map(|message| WireMessage {
                role: match message.role {
                    MessageRole::Assistant => "assistant",
                    MessageRole::User | MessageRole::System => "user",
                },
                content: message.content.clone(),
            })
            .collect();

        MessagesRequest {
            model: model.to_string(),
            max_tokens: params.max_tokens,
            system,
            messages: wire_messages,
            temperature: params.temperature,
        }
    }

    fn parse_response(response: MessagesResponse, requested_model: &str) -> Result<CanonicalResponse, ProviderError> {
        let content = response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if content.is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "response carried no text content".to_string(),
            });
        }

        let mut canonical = CanonicalResponse::new(
            content,
            response.model.unwrap_or_else(|| requested_model.to_string()),
        );
        if let Some(usage) = response.usage {
            canonical = canonical.with_usage(TokenUsage::new(usage.input_tokens, usage.output_tokens));
        }
        Ok(canonical)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "Anthropic"
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

        let request = Self::build_request(messages, model, params);
        let response = self
            .client
            .post(&self.messages_url)
            .header("anthropic-version", API_VERSION)
            .header("x-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER_ID, &e))?;

        if !response.status().is_success() {
            return Err(api_error(PROVIDER_ID, response).await);
        }

        let body: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                })?;
        Self::parse_response(body, model)
    }
}
