//! Built-in filters registered by [`build_engine`](super::build_engine).
//!
//! These cover the orchestration concerns PanelForge ships with: scrubbing
//! secrets out of outbound prompts, pulling structured component
//! definitions out of model replies, and refusing to burn fallback
//! attempts on caller mistakes.

use super::context::ExecutionContext;
use super::filter::{
    ErrorFilter, FallbackDecision, FilterEntry, FilterRegistry, PostProcessFilter, PreProcessFilter,
};
use crate::error::{EngineError, ProviderError};
use crate::llm::{CanonicalResponse, ChatMessage, scrub_secret_patterns};
use serde_json::Value;
use std::sync::Arc;

/// Pre-process: redact secret-like tokens from every outbound message.
/// Uploaded P&ID notes and pasted controller configs routinely contain
/// credentials that must not reach a third-party backend.
pub struct RedactSecrets;

impl PreProcessFilter for RedactSecrets {
    fn id(&self) -> &str {
        "redact-secrets"
    }

    fn apply(
        &self,
        messages: Vec<ChatMessage>,
        context: &mut ExecutionContext,
    ) -> Result<Vec<ChatMessage>, EngineError> {
        let mut redactions = 0usize;
        let messages = messages
            .into_iter()
            .map(|mut message| {
                let scrubbed = scrub_secret_patterns(&message.content);
                if let std::borrow::Cow::Owned(clean) = scrubbed {
                    redactions += 1;
                    message.content = clean;
                }
                message
            })
            .collect();

        if redactions > 0 {
            context
                .metadata
                .diagnostics
                .push(format!("redact-secrets: scrubbed {redactions} message(s)"));
        }
        Ok(messages)
    }
}

/// Post-process: drop `<thinking>` spans some models emit before their
/// actual answer.
pub struct StripReasoning;

impl PostProcessFilter for StripReasoning {
    fn id(&self) -> &str {
        "strip-reasoning"
    }

    fn apply(
        &self,
        response: CanonicalResponse,
        _context: &mut ExecutionContext,
    ) -> Result<CanonicalResponse, EngineError> {
        const OPEN: &str = "<thinking>";
        const CLOSE: &str = "</thinking>";

        let mut content = response.content.clone();
        while let Some(start) = content.find(OPEN) {
            let Some(rel_end) = content[start..].find(CLOSE) else {
                break;
            };
            content.replace_range(start..start + rel_end + CLOSE.len(), "");
        }
        let content = content.trim().to_string();

        Ok(CanonicalResponse {
            content,
            ..response
        })
    }
}

/// Post-process: parse fenced ```json blocks out of the reply and stash
/// every valid value under `extracted["components"]`. This is how the
/// component-generation pipeline hands structured symbol definitions to
/// the CRUD layer without re-parsing prose.
pub struct ExtractComponents;

impl ExtractComponents {
    fn fenced_json_blocks(text: &str) -> Vec<Value> {
        const OPEN: &str = "```json";
        const CLOSE: &str = "```";

        let mut values = Vec::new();
        let mut search_from = 0;
        while let Some(rel_open) = text[search_from..].find(OPEN) {
            let content_start = search_from + rel_open + OPEN.len();
            let Some(rel_close) = text[content_start..].find(CLOSE) else {
                break;
            };
            let block = &text[content_start..content_start + rel_close];
            if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
                values.push(value);
            }
            search_from = content_start + rel_close + CLOSE.len();
        }
        values
    }
}

impl PostProcessFilter for ExtractComponents {
    fn id(&self) -> &str {
        "extract-components"
    }

    fn apply(
        &self,
        response: CanonicalResponse,
        context: &mut ExecutionContext,
    ) -> Result<CanonicalResponse, EngineError> {
        let blocks = Self::fenced_json_blocks(&response.content);
        if !blocks.is_empty() {
            // Arrays of components flatten into one list.
            let mut components = Vec::new();
            for block in blocks {
                match block {
                    Value::Array(items) => components.extend(items),
                    other => components.push(other),
                }
            }
            context
                .extracted
                .insert("components".to_string(), Value::Array(components));
        }
        Ok(response)
    }
}

/// Error filter: veto fallback when the failure is the caller's input.
/// A malformed request fails identically on every backend; retrying it
/// against the whole preference list only adds latency and cost.
pub struct HaltOnInvalidRequest;

impl ErrorFilter for HaltOnInvalidRequest {
    fn id(&self) -> &str {
        "halt-on-invalid-request"
    }

    fn apply(&self, error: &ProviderError, context: &mut ExecutionContext) -> FallbackDecision {
        if error.is_caller_error() {
            context.metadata.diagnostics.push(format!(
                "halt-on-invalid-request: aborting fallback after {}",
                error.provider()
            ));
            FallbackDecision::Abort
        } else {
            FallbackDecision::Continue
        }
    }
}

/// Register every built-in filter.
pub fn register_builtin_filters(registry: &FilterRegistry) {
    registry.register(FilterEntry::Pre(Arc::new(RedactSecrets)));
    registry.register(FilterEntry::Post(Arc::new(StripReasoning)));
    registry.register(FilterEntry::Post(Arc::new(ExtractComponents)));
    registry.register(FilterEntry::Error(Arc::new(HaltOnInvalidRequest)));
}
