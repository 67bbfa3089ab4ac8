use super::types::{CanonicalResponse, ChatMessage, MessageRole};
use crate::error::ProviderError;
use async_trait::async_trait;

/// Sampling knobs resolved by the engine from pipeline defaults and
/// per-call overrides before the adapter is invoked.
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// Adapter to one external language-model backend.
///
/// Implementations are stateless with respect to calls: construction wires
/// credentials and endpoints, after which the adapter is shared behind an
/// `Arc` and never mutated. Each adapter owns serde request/response types
/// matching its backend's wire format and reduces every reply to a
/// [`CanonicalResponse`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry id (e.g. "anthropic", "openai").
    fn id(&self) -> &str;

    /// Human-readable name for admin listings.
    fn display_name(&self) -> &str;

    /// Models this backend serves, preferred first. The first entry is the
    /// default when a call names no model.
    fn supported_models(&self) -> &[String];

    /// Whether the credentials/environment required to attempt this backend
    /// are present. Unconfigured providers are never selected.
    fn is_configured(&self) -> bool;

    /// Dispatch one completion call. The engine owns the deadline; adapters
    /// must not install a shorter overall timeout of their own.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        params: SamplingParams,
    ) -> Result<CanonicalResponse, ProviderError>;
}

/// Split a message sequence into the backend-agnostic form most chat APIs
/// want: an optional system string (multiple system turns are joined) and
/// the remaining turns in their original order.
pub fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut turns = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role == MessageRole::System {
            system_parts.push(&message.content);
        } else {
            turns.push(message);
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, turns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_system_extracts_single_system_turn() {
        let messages = vec![
            ChatMessage::system("You design HMI layouts."),
            ChatMessage::user("Add a pump"),
        ];
        let (system, turns) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("You design HMI layouts."));
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "Add a pump");
    }

    #[test]
    fn split_system_joins_multiple_system_turns() {
        let messages = vec![
            ChatMessage::system("First."),
            ChatMessage::user("hi"),
            ChatMessage::system("Second."),
        ];
        let (system, turns) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("First.\n\nSecond."));
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn split_system_preserves_turn_order() {
        let messages = vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
        ];
        let (system, turns) = split_system(&messages);
        assert!(system.is_none());
        let contents: Vec<&str> = turns.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn split_system_handles_empty_input() {
        let (system, turns) = split_system(&[]);
        assert!(system.is_none());
        assert!(turns.is_empty());
    }

    #[test]
    fn sampling_params_default_is_sane() {
        let params = SamplingParams::default();
        assert!(params.temperature > 0.0);
        assert!(params.max_tokens > 0);
    }
}
