use super::context::ExecutionContext;
use crate::error::{EngineError, ProviderError};
use crate::llm::{CanonicalResponse, ChatMessage};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The three filter positions in a pipeline. A filter's kind is fixed at
/// registration; pipelines may only reference a filter from the matching
/// chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FilterKind {
    PreProcess,
    PostProcess,
    Error,
}

/// What an error filter tells the engine to do with the fallback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Keep going: try the next ranked provider.
    Continue,
    /// Stop: the failure will not be fixed by another provider.
    Abort,
}

/// Maps a message sequence to a message sequence before dispatch. May add
/// or annotate messages but must preserve the order of existing turns.
pub trait PreProcessFilter: Send + Sync {
    fn id(&self) -> &str;
    fn apply(
        &self,
        messages: Vec<ChatMessage>,
        context: &mut ExecutionContext,
    ) -> Result<Vec<ChatMessage>, EngineError>;
}

/// Maps a successful response to a (possibly annotated) response and may
/// write derived data into `context.extracted`.
pub trait PostProcessFilter: Send + Sync {
    fn id(&self) -> &str;
    fn apply(
        &self,
        response: CanonicalResponse,
        context: &mut ExecutionContext,
    ) -> Result<CanonicalResponse, EngineError>;
}

/// Inspects a provider failure and decides whether fallback should
/// continue. Its only allowed effect on shared state is appending to
/// `context.metadata.diagnostics`.
pub trait ErrorFilter: Send + Sync {
    fn id(&self) -> &str;
    fn apply(&self, error: &ProviderError, context: &mut ExecutionContext) -> FallbackDecision;
}

/// A registered filter: the kind tag travels with the trait object so the
/// registry can check chain/kind agreement at pipeline registration.
#[derive(Clone)]
pub enum FilterEntry {
    Pre(Arc<dyn PreProcessFilter>),
    Post(Arc<dyn PostProcessFilter>),
    Error(Arc<dyn ErrorFilter>),
}

impl FilterEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Pre(filter) => filter.id(),
            Self::Post(filter) => filter.id(),
            Self::Error(filter) => filter.id(),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Pre(_) => FilterKind::PreProcess,
            Self::Post(_) => FilterKind::PostProcess,
            Self::Error(_) => FilterKind::Error,
        }
    }
}

/// Admin-surface view of one registered filter.
#[derive(Debug, Clone, Serialize)]
pub struct FilterInfo {
    pub id: String,
    pub kind: FilterKind,
}

/// Named, typed transformation steps composable into pipeline chains.
pub struct FilterRegistry {
    filters: RwLock<HashMap<String, FilterEntry>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            filters: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, entry: FilterEntry) {
        let id = entry.id().to_string();
        let mut filters = self.filters.write().expect("filter registry lock poisoned");
        if filters.insert(id.clone(), entry).is_some() {
            tracing::debug!(filter = id.as_str(), "replaced existing filter registration");
        }
    }

    pub fn get(&self, id: &str) -> Result<FilterEntry, EngineError> {
        let filters = self.filters.read().expect("filter registry lock poisoned");
        filters
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::Configuration(format!("unknown filter: {id}")))
    }

    pub fn contains(&self, id: &str) -> bool {
        let filters = self.filters.read().expect("filter registry lock poisoned");
        filters.contains_key(id)
    }

    /// Sorted by id for stable admin output.
    pub fn list(&self) -> Vec<FilterInfo> {
        let filters = self.filters.read().expect("filter registry lock poisoned");
        let mut infos: Vec<FilterInfo> = filters
            .values()
            .map(|entry| FilterInfo {
                id: entry.id().to_string(),
                kind: entry.kind(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Resolve a pre-process chain, rejecting unknown ids and kind
    /// mismatches.
    pub fn pre_chain(&self, ids: &[String]) -> Result<Vec<Arc<dyn PreProcessFilter>>, EngineError> {
        ids.iter()
            .map(|id| match self.get(id)? {
                FilterEntry::Pre(filter) => Ok(filter),
                entry => Err(kind_mismatch(id, FilterKind::PreProcess, entry.kind())),
            })
            .collect()
    }

    /// Resolve a post-process chain.
    pub fn post_chain(&self, ids: &[String]) -> Result<Vec<Arc<dyn PostProcessFilter>>, EngineError> {
        ids.iter()
            .map(|id| match self.get(id)? {
                FilterEntry::Post(filter) => Ok(filter),
                entry => Err(kind_mismatch(id, FilterKind::PostProcess, entry.kind())),
            })
            .collect()
    }

    /// Resolve an error chain.
    pub fn error_chain(&self, ids: &[String]) -> Result<Vec<Arc<dyn ErrorFilter>>, EngineError> {
        ids.iter()
            .map(|id| match self.get(id)? {
                FilterEntry::Error(filter) => Ok(filter),
                entry => Err(kind_mismatch(id, FilterKind::Error, entry.kind())),
            })
            .collect()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_mismatch(id: &str, expected: FilterKind, actual: FilterKind) -> EngineError {
    EngineError::Configuration(format!(
        "filter {id} is {actual}, chain expects {expected}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseFilter;

    impl PreProcessFilter for UppercaseFilter {
        fn id(&self) -> &str {
            "uppercase"
        }

        fn apply(
            &self,
            messages: Vec<ChatMessage>,
            _context: &mut ExecutionContext,
        ) -> Result<Vec<ChatMessage>, EngineError> {
            Ok(messages
                .into_iter()
                .map(|mut m| {
                    m.content = m.content.to_uppercase();
                    m
                })
                .collect())
        }
    }

    struct AlwaysAbort;

    impl ErrorFilter for AlwaysAbort {
        fn id(&self) -> &str {
            "always-abort"
        }

        fn apply(&self, _error: &ProviderError, _context: &mut ExecutionContext) -> FallbackDecision {
            FallbackDecision::Abort
        }
    }

    #[test]
    fn filter_kind_displays_kebab_case() {
        assert_eq!(FilterKind::PreProcess.to_string(), "pre-process");
        assert_eq!(FilterKind::PostProcess.to_string(), "post-process");
        assert_eq!(FilterKind::Error.to_string(), "error");
    }

    #[test]
    fn register_and_list_reports_kinds() {
        let registry = FilterRegistry::new();
        registry.register(FilterEntry::Pre(Arc::new(UppercaseFilter)));
        registry.register(FilterEntry::Error(Arc::new(AlwaysAbort)));

        let infos = registry.list();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].id, "always-abort");
        assert_eq!(infos[0].kind, FilterKind::Error);
        assert_eq!(infos[1].id, "uppercase");
        assert_eq!(infos[1].kind, FilterKind::PreProcess);
    }

    #[test]
    fn unknown_filter_is_configuration_error() {
        let registry = FilterRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn chain_resolution_rejects_kind_mismatch() {
        let registry = FilterRegistry::new();
        registry.register(FilterEntry::Pre(Arc::new(UppercaseFilter)));

        let err = registry
            .post_chain(&["uppercase".to_string()])
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("uppercase"));
        assert!(msg.contains("pre-process"));
    }

    #[test]
    fn chain_resolution_preserves_order() {
        struct Named(&'static str);
        impl PreProcessFilter for Named {
            fn id(&self) -> &str {
                self.0
            }
            fn apply(
                &self,
                messages: Vec<ChatMessage>,
                _context: &mut ExecutionContext,
            ) -> Result<Vec<ChatMessage>, EngineError> {
                Ok(messages)
            }
        }

        let registry = FilterRegistry::new();
        registry.register(FilterEntry::Pre(Arc::new(Named("first"))));
        registry.register(FilterEntry::Pre(Arc::new(Named("second"))));

        let chain = registry
            .pre_chain(&["second".to_string(), "first".to_string()])
            .unwrap();
        let ids: Vec<&str> = chain.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn pre_filter_transforms_messages() {
        let registry = FilterRegistry::new();
        registry.register(FilterEntry::Pre(Arc::new(UppercaseFilter)));
        let chain = registry.pre_chain(&["uppercase".to_string()]).unwrap();

        let mut context = ExecutionContext::new("p", vec![]);
        let messages = chain[0]
            .apply(vec![ChatMessage::user("hello")], &mut context)
            .unwrap();
        assert_eq!(messages[0].content, "HELLO");
    }
}
