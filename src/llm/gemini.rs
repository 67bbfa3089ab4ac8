use super::http_client::build_provider_client;
use super::scrub::{api_error, transport_error};
use super::traits::{Provider, SamplingParams, split_system};
use super::types::{CanonicalResponse, ChatMessage, MessageRole, TokenUsage};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER_ID: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

fn default_models() -> Vec<String> {
    vec![
        "gemini-2.5-flash".to_string(),
        "gemini-2.5-pro".to_string(),
    ]
}

/// Google Gemini `generateContent` adapter.
pub struct GeminiProvider {
    api_key: Option<String>,
    base_url: String,
    models: Vec<String>,
    client: Client,
}

// ─── Wire format ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

// ─── Adapter ────────────────────────────────────────────────────────────────

impl GeminiProvider {
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
            base_url: base,
            models,
            client: build_provider_client(),
        }
    }

    fn build_request(messages: &[ChatMessage], params: SamplingParams) -> GenerateRequest {
        let (system, turns) = split_system(messages);
        let contents = turns
            .iter()
            .map(|message| Content {
                role: Some(
                    match message.role {
                        MessageRole::Assistant => "model",
                        MessageRole::User | MessageRole::System => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: message.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            },
        }
    }

    fn parse_response(
        response: GenerateResponse,
        requested_model: &str,
    ) -> Result<CanonicalResponse, ProviderError> {
        let content = response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "response carried no candidates with text".to_string(),
            });
        }

        let mut canonical = CanonicalResponse::new(
            content,
            response
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
        );
        if let Some(usage) = response.usage_metadata {
            canonical = canonical.with_usage(TokenUsage::new(
                usage.prompt_token_count,
                usage.candidates_token_count,
            ));
        }
        Ok(canonical)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "Google Gemini"
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

        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let request = Self::build_request(messages, params);
        let response = self
            .client
            .post(&url)
            // Key goes in a header, not the query string, to keep it out of
            // access logs on proxies.
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER_ID, &e))?;

        if !response.status().is_success() {
            return Err(api_error(PROVIDER_ID, response).await);
        }

        let body: GenerateResponse =
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_only_with_key() {
        assert!(GeminiProvider::new(Some("AIza-test".into())).is_configured());
        assert!(!GeminiProvider::new(None).is_configured());
    }

    #[test]
    fn build_request_maps_assistant_to_model_role() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("u"),
            ChatMessage::assistant("a"),
        ];
        let request = GeminiProvider::build_request(&messages, SamplingParams::default());
        assert!(request.system_instruction.is_some());
        let roles: Vec<&str> = request
            .contents
            .iter()
            .filter_map(|c| c.role.as_deref())
            .collect();
        assert_eq!(roles, vec!["user", "model"]);
    }

    #[test]
    fn build_request_serializes_camel_case_config() {
        let request = GeminiProvider::build_request(
            &[ChatMessage::user("hi")],
            SamplingParams {
                temperature: 0.4,
                max_tokens: 512,
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(json["generationConfig"]["temperature"], 0.4);
    }

    #[test]
    fn parse_response_concatenates_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}],
                "usageMetadata":{"promptTokenCount":2,"candidatesTokenCount":3},
                "modelVersion":"gemini-2.5-flash-001"}"#,
        )
        .unwrap();
        let canonical = GeminiProvider::parse_response(body, "gemini-2.5-flash").unwrap();
        assert_eq!(canonical.content, "Hello");
        assert_eq!(canonical.model, "gemini-2.5-flash-001");
        assert_eq!(canonical.usage.total_tokens(), Some(5));
    }

    #[test]
    fn parse_response_rejects_empty_candidates() {
        let body: GenerateResponse = serde_json::from_str(r"{}").unwrap();
        let err = GeminiProvider::parse_response(body, "gemini-2.5-flash").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }
}
