//! Shared test harness: scripted in-memory providers and engine assembly.
#![allow(dead_code)] // not every test binary uses every helper

use async_trait::async_trait;
use panelforge::engine::{
    CachePolicy, ExecutionEngine, FilterChains, FilterRegistry, Pipeline, PipelineDefaults,
    PipelineRegistry, PerformanceTracker, ResultCache, register_builtin_filters,
};
use panelforge::error::ProviderError;
use panelforge::llm::{
    CanonicalResponse, ChatMessage, Provider, ProviderRegistry, SamplingParams, TokenUsage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Order log shared across providers so tests can observe attempt order.
pub type AttemptLog = Arc<Mutex<Vec<String>>>;

pub fn attempt_log() -> AttemptLog {
    Arc::new(Mutex::new(Vec::new()))
}

enum Behavior {
    Succeed(String),
    FailRequest(String),
    FailInvalidRequest(String),
}

/// A provider with scripted behavior, call counting, and message capture.
pub struct ScriptedProvider {
    id: String,
    models: Vec<String>,
    configured: bool,
    behavior: Behavior,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    seen_messages: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    order_log: Option<AttemptLog>,
}

impl ScriptedProvider {
    pub fn ok(id: &str, reply: &str) -> Self {
        Self::new(id, Behavior::Succeed(reply.to_string()))
    }

    pub fn failing(id: &str) -> Self {
        Self::new(id, Behavior::FailRequest(format!("{id} is down")))
    }

    pub fn rejecting(id: &str) -> Self {
        Self::new(
            id,
            Behavior::FailInvalidRequest("caller sent an unknown model".to_string()),
        )
    }

    fn new(id: &str, behavior: Behavior) -> Self {
        Self {
            id: id.to_string(),
            models: vec![format!("{id}-default-model")],
            configured: true,
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_messages: Arc::new(Mutex::new(Vec::new())),
            order_log: None,
        }
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_order_log(mut self, log: &AttemptLog) -> Self {
        self.order_log = Some(Arc::clone(log));
        self
    }

    /// Handle for asserting call counts after the provider moves into the
    /// registry.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Handle for asserting what messages reached the backend.
    pub fn message_capture(&self) -> Arc<Mutex<Vec<Vec<ChatMessage>>>> {
        Arc::clone(&self.seen_messages)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.id
    }

    fn supported_models(&self) -> &[String] {
        &self.models
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        _params: SamplingParams,
    ) -> Result<CanonicalResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.order_log {
            log.lock().unwrap().push(self.id.clone());
        }
        self.seen_messages.lock().unwrap().push(messages.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Succeed(reply) => Ok(CanonicalResponse::new(reply.clone(), model)
                .with_usage(TokenUsage::new(7, 11))),
            Behavior::FailRequest(message) => Err(ProviderError::Request {
                provider: self.id.clone(),
                message: message.clone(),
            }),
            Behavior::FailInvalidRequest(message) => Err(ProviderError::InvalidRequest {
                provider: self.id.clone(),
                message: message.clone(),
            }),
        }
    }
}

/// A pipeline with no filters and a short timeout, over the given provider
/// preference.
pub fn pipeline(id: &str, providers: &[&str]) -> Pipeline {
    Pipeline {
        id: id.to_string(),
        provider_preference: providers.iter().map(ToString::to_string).collect(),
        filters: FilterChains::default(),
        system_prompt: String::new(),
        defaults: PipelineDefaults {
            timeout_ms: 1_000,
            ..PipelineDefaults::default()
        },
    }
}

/// Assemble an engine over scripted providers with the built-in filters
/// registered and a 60s/100-entry cache.
pub fn build_test_engine(
    providers: Vec<Arc<dyn Provider>>,
    pipelines: Vec<Pipeline>,
) -> ExecutionEngine {
    build_test_engine_with_policy(providers, pipelines, CachePolicy::default())
}

pub fn build_test_engine_with_policy(
    providers: Vec<Arc<dyn Provider>>,
    pipelines: Vec<Pipeline>,
    cache_policy: CachePolicy,
) -> ExecutionEngine {
    let provider_registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        provider_registry.register(provider);
    }

    let filter_registry = Arc::new(FilterRegistry::new());
    register_builtin_filters(&filter_registry);

    let pipeline_registry = Arc::new(PipelineRegistry::new());
    for p in pipelines {
        pipeline_registry
            .register(p, &provider_registry, &filter_registry)
            .expect("test pipeline should validate");
    }

    ExecutionEngine::new(
        provider_registry,
        filter_registry,
        pipeline_registry,
        Arc::new(PerformanceTracker::new()),
        Arc::new(ResultCache::new(Duration::from_secs(60), 100)),
        cache_policy,
    )
}
