use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Monotonically accumulating per-provider counters. Created lazily on a
/// provider's first recorded attempt and kept for the life of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceMetric {
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Incremental running mean, never recomputed from history.
    pub average_response_time_ms: f64,
}

impl PerformanceMetric {
    /// Always in `[0, 1]`; zero for a provider with no requests.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    /// Ranking score: reward success rate, penalize latency.
    fn score(&self) -> f64 {
        self.success_rate() * 100.0 - self.average_response_time_ms / 1000.0
    }
}

/// Serialized form for the admin metrics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub average_response_time_ms: f64,
    pub success_rate: f64,
}

impl From<PerformanceMetric> for MetricSnapshot {
    fn from(metric: PerformanceMetric) -> Self {
        Self {
            total_requests: metric.total_requests,
            successful_requests: metric.successful_requests,
            average_response_time_ms: metric.average_response_time_ms,
            success_rate: metric.success_rate(),
        }
    }
}

/// Process-wide provider performance history driving adaptive ranking.
///
/// The map lives behind a `Mutex` because executions run on a
/// multi-threaded runtime and record from whatever worker polled them;
/// each record is one short read-modify-write.
pub struct PerformanceTracker {
    metrics: Mutex<HashMap<String, PerformanceMetric>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(HashMap::new()),
        }
    }

    /// Record one attempt's outcome and fold its latency into the running
    /// mean.
    pub fn record(&self, provider_id: &str, response_time_ms: f64, success: bool) {
        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
        let metric = metrics.entry(provider_id.to_string()).or_default();
        metric.total_requests += 1;
        if success {
            metric.successful_requests += 1;
        }
        metric.average_response_time_ms +=
            (response_time_ms - metric.average_response_time_ms) / metric.total_requests as f64;
    }

    /// Ranking score for a provider, or `None` when nothing has been
    /// recorded yet (unknown-but-eligible).
    pub fn score(&self, provider_id: &str) -> Option<f64> {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        metrics.get(provider_id).map(PerformanceMetric::score)
    }

    pub fn metric(&self, provider_id: &str) -> Option<PerformanceMetric> {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        metrics.get(provider_id).copied()
    }

    /// Sort provider ids descending by score. The sort is stable: ties and
    /// never-attempted providers keep their pipeline-declared order, and
    /// unknowns always sort after scored providers.
    pub fn rank(&self, provider_ids: &[String]) -> Vec<String> {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        let mut ranked = provider_ids.to_vec();
        ranked.sort_by(|a, b| {
            let score_a = metrics.get(a).map(PerformanceMetric::score);
            let score_b = metrics.get(b).map(PerformanceMetric::score);
            match (score_a, score_b) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        ranked
    }

    /// Sorted copy of every metric for the admin surface.
    pub fn snapshot(&self) -> BTreeMap<String, MetricSnapshot> {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        metrics
            .iter()
            .map(|(id, metric)| (id.clone(), MetricSnapshot::from(*metric)))
            .collect()
    }

    /// Admin reset: drop all accumulated history.
    pub fn reset(&self) {
        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
        metrics.clear();
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}
