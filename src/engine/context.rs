use crate::llm::CanonicalResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-call overrides supplied by the caller. Every field is optional;
/// unset fields fall back to the pipeline's defaults.
///
/// Serialization skips unset fields so the struct canonicalizes into the
/// cache fingerprint without noise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Diagnostic accumulator inside an [`ExecutionContext`]. Error filters may
/// append to `diagnostics`; everything else is engine-owned.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionMetadata {
    pub started_at: DateTime<Utc>,
    pub attempted_providers: Vec<String>,
    pub diagnostics: Vec<String>,
}

/// Mutable per-call state, exclusively owned by one in-flight execution and
/// discarded when the call completes or fails terminally.
///
/// `remaining_providers` is crate-private on purpose: the fallback queue
/// belongs to the execution engine alone, and keeping the field out of the
/// public API makes that a compile-time guarantee for downstream filter
/// implementations.
#[derive(Debug)]
pub struct ExecutionContext {
    pub pipeline_id: String,
    pub request_id: String,
    pub(crate) remaining_providers: Vec<String>,
    /// Structured data produced by post-process filters (extracted component
    /// definitions and the like), keyed by filter-chosen names.
    pub extracted: serde_json::Map<String, Value>,
    pub metadata: ExecutionMetadata,
}

impl ExecutionContext {
    pub(crate) fn new(pipeline_id: impl Into<String>, remaining_providers: Vec<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            remaining_providers,
            extracted: serde_json::Map::new(),
            metadata: ExecutionMetadata {
                started_at: Utc::now(),
                attempted_providers: Vec::new(),
                diagnostics: Vec::new(),
            },
        }
    }

    /// Freeze the caller-visible portion of this context.
    pub(crate) fn snapshot(&self, elapsed_ms: u64) -> ContextSnapshot {
        ContextSnapshot {
            request_id: self.request_id.clone(),
            pipeline_id: self.pipeline_id.clone(),
            attempted_providers: self.metadata.attempted_providers.clone(),
            diagnostics: self.metadata.diagnostics.clone(),
            extracted: self.extracted.clone(),
            elapsed_ms,
        }
    }
}

/// The immutable, caller-visible summary of an execution's context.
/// This is what crosses the API boundary; the live [`ExecutionContext`]
/// never leaves the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub request_id: String,
    pub pipeline_id: String,
    pub attempted_providers: Vec<String>,
    pub diagnostics: Vec<String>,
    pub extracted: serde_json::Map<String, Value>,
    pub elapsed_ms: u64,
}

/// A completed successful execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub response: CanonicalResponse,
    /// Provider that produced the response.
    pub provider: String,
    /// Model actually dispatched (caller override or provider default).
    pub model: String,
    pub context: ContextSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_options_serialize_compactly() {
        let options = CallOptions {
            model: Some("gpt-4o".into()),
            ..CallOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(json, r#"{"model":"gpt-4o"}"#);
    }

    #[test]
    fn call_options_default_is_empty_object() {
        let json = serde_json::to_string(&CallOptions::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn context_gets_unique_request_ids() {
        let a = ExecutionContext::new("p", vec![]);
        let b = ExecutionContext::new("p", vec![]);
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn snapshot_copies_attempts_and_extracted() {
        let mut context = ExecutionContext::new("component-generation", vec!["a".into()]);
        context.metadata.attempted_providers.push("anthropic".into());
        context
            .extracted
            .insert("components".into(), serde_json::json!([{"type": "pump"}]));

        let snapshot = context.snapshot(42);
        assert_eq!(snapshot.pipeline_id, "component-generation");
        assert_eq!(snapshot.attempted_providers, vec!["anthropic".to_string()]);
        assert_eq!(snapshot.extracted["components"][0]["type"], "pump");
        assert_eq!(snapshot.elapsed_ms, 42);
    }
}
