use super::cache::{ResultCache, fingerprint};
use super::context::{CallOptions, ExecutionContext, ExecutionResult};
use super::filter::{FallbackDecision, FilterRegistry};
use super::metrics::PerformanceTracker;
use super::pipeline::{Pipeline, PipelineRegistry};
use crate::error::{EngineError, ProviderError};
use crate::llm::{ChatMessage, MessageRole, ProviderRegistry, SamplingParams};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache admission policy. Replaying sampled output is surprising to some
/// deployments, so it is configurable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePolicy {
    /// When set, calls with an effective temperature above zero are never
    /// memoized and always reach a provider.
    pub skip_sampling: bool,
}

/// The orchestrator: ties registries, tracker, and cache together for one
/// call at a time. Cheap to share behind an `Arc`; all mutable state lives
/// in the collaborators or in the per-call [`ExecutionContext`].
pub struct ExecutionEngine {
    providers: Arc<ProviderRegistry>,
    filters: Arc<FilterRegistry>,
    pipelines: Arc<PipelineRegistry>,
    tracker: Arc<PerformanceTracker>,
    cache: Arc<ResultCache>,
    cache_policy: CachePolicy,
}

impl ExecutionEngine {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        filters: Arc<FilterRegistry>,
        pipelines: Arc<PipelineRegistry>,
        tracker: Arc<PerformanceTracker>,
        cache: Arc<ResultCache>,
        cache_policy: CachePolicy,
    ) -> Self {
        Self {
            providers,
            filters,
            pipelines,
            tracker,
            cache,
            cache_policy,
        }
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub fn filters(&self) -> &Arc<FilterRegistry> {
        &self.filters
    }

    pub fn pipelines(&self) -> &Arc<PipelineRegistry> {
        &self.pipelines
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Run one conversation request through the pipeline's provider
    /// preference until a provider succeeds, the error chain vetoes
    /// fallback, or the preference list is exhausted.
    pub async fn execute(
        &self,
        pipeline_id: &str,
        messages: Vec<ChatMessage>,
        options: CallOptions,
    ) -> Result<ExecutionResult, EngineError> {
        if messages.is_empty() {
            return Err(EngineError::Validation(
                "messages must not be empty".to_string(),
            ));
        }

        // ── Fingerprint & cache check ──
        let key = fingerprint(pipeline_id, &messages, &options);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(
                pipeline = pipeline_id,
                request = hit.context.request_id.as_str(),
                "cache hit, no provider contacted"
            );
            return Ok(hit);
        }

        // ── Pipeline resolution ──
        let pipeline = self.pipelines.get(pipeline_id)?;

        // ── Context construction ──
        let remaining = self.eligible_providers(&pipeline, &options)?;
        let mut context = ExecutionContext::new(pipeline_id, remaining);
        let started = Instant::now();

        // ── System-prompt insertion ──
        let mut messages = messages;
        if !pipeline.system_prompt.is_empty()
            && !messages.iter().any(|m| m.role == MessageRole::System)
        {
            messages.insert(0, ChatMessage::system(pipeline.system_prompt.clone()));
        }

        // Resolve filter chains up front: a pipeline referencing a filter
        // that was dropped after registration fails here, before any
        // provider is billed.
        let pre_filters = self.filters.pre_chain(&pipeline.filters.pre_process)?;
        let post_filters = self.filters.post_chain(&pipeline.filters.post_process)?;
        let error_filters = self.filters.error_chain(&pipeline.filters.on_error)?;

        // ── Pre-process filters ──
        for filter in &pre_filters {
            messages = filter.apply(messages, &mut context).map_err(|e| {
                EngineError::Filter {
                    filter: filter.id().to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        // ── Provider attempt loop ──
        let mut last_error: Option<ProviderError> = None;
        while !context.remaining_providers.is_empty() {
            let provider_id = context.remaining_providers.remove(0);
            let provider = self.providers.get(&provider_id)?;

            let model = options
                .model
                .clone()
                .or_else(|| provider.supported_models().first().cloned())
                .unwrap_or_default();
            if model.is_empty() {
                tracing::warn!(
                    provider = provider_id.as_str(),
                    "provider declares no models, skipping"
                );
                last_error = Some(ProviderError::NotConfigured {
                    provider: provider_id.clone(),
                });
                continue;
            }

            let timeout_ms = effective_timeout(pipeline.defaults.timeout_ms, options.timeout_ms);
            let params = SamplingParams {
                temperature: options.temperature.unwrap_or(pipeline.defaults.temperature),
                max_tokens: options.max_tokens.unwrap_or(pipeline.defaults.max_tokens),
            };

            context.metadata.attempted_providers.push(provider_id.clone());
            let attempt_started = Instant::now();
            let outcome = tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                provider.complete(&messages, &model, params),
            )
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::Timeout {
                    provider: provider_id.clone(),
                    timeout_ms,
                })
            });
            let elapsed_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(response) => {
                    self.tracker.record(&provider_id, elapsed_ms, true);
                    tracing::info!(
                        pipeline = pipeline_id,
                        provider = provider_id.as_str(),
                        model = model.as_str(),
                        elapsed_ms = elapsed_ms as u64,
                        "provider call succeeded"
                    );

                    // ── Post-process filters ──
                    let mut response = response;
                    for filter in &post_filters {
                        response = filter.apply(response, &mut context).map_err(|e| {
                            EngineError::Filter {
                                filter: filter.id().to_string(),
                                message: e.to_string(),
                            }
                        })?;
                    }

                    let result = ExecutionResult {
                        response,
                        provider: provider_id,
                        model,
                        context: context.snapshot(started.elapsed().as_millis() as u64),
                    };

                    if self.should_cache(params.temperature) {
                        self.cache.insert(key, result.clone());
                    }
                    return Ok(result);
                }
                Err(error) => {
                    self.tracker.record(&provider_id, elapsed_ms, false);
                    tracing::warn!(
                        pipeline = pipeline_id,
                        provider = provider_id.as_str(),
                        error = %error,
                        "provider attempt failed, evaluating fallback"
                    );

                    // ── Error filters ──
                    for filter in &error_filters {
                        if filter.apply(&error, &mut context) == FallbackDecision::Abort {
                            tracing::warn!(
                                pipeline = pipeline_id,
                                filter = filter.id(),
                                "error filter vetoed fallback, failing terminally"
                            );
                            return Err(EngineError::Provider(error));
                        }
                    }
                    last_error = Some(error);
                }
            }
        }

        // ── Exhaustion ──
        Err(EngineError::AllProvidersFailed {
            pipeline: pipeline_id.to_string(),
            attempted: context.metadata.attempted_providers.clone(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no configured providers were eligible".to_string()),
        })
    }

    /// Build the initial fallback queue: the forced provider alone, or the
    /// pipeline preference filtered to configured providers and reordered
    /// by tracked performance. Unconfigured providers are never selected;
    /// an empty queue falls through to the exhaustion error.
    fn eligible_providers(
        &self,
        pipeline: &Pipeline,
        options: &CallOptions,
    ) -> Result<Vec<String>, EngineError> {
        if let Some(forced) = &options.force_provider {
            let provider = self.providers.get(forced)?;
            if provider.is_configured() {
                return Ok(vec![forced.clone()]);
            }
            tracing::warn!(provider = forced.as_str(), "forced provider is not configured");
            return Ok(Vec::new());
        }

        let eligible: Vec<String> = pipeline
            .provider_preference
            .iter()
            .filter(|id| match self.providers.get(id) {
                Ok(provider) => provider.is_configured(),
                Err(_) => {
                    tracing::warn!(provider = id.as_str(), "preference names unknown provider");
                    false
                }
            })
            .cloned()
            .collect();
        Ok(self.tracker.rank(&eligible))
    }

    fn should_cache(&self, effective_temperature: f64) -> bool {
        !(self.cache_policy.skip_sampling && effective_temperature > 0.0)
    }
}

/// Per-attempt deadline: the pipeline default caps whatever the caller
/// asks for.
fn effective_timeout(pipeline_timeout_ms: u64, requested_ms: Option<u64>) -> u64 {
    pipeline_timeout_ms.min(requested_ms.unwrap_or(pipeline_timeout_ms))
}
