use super::context::{CallOptions, ExecutionResult};
use crate::llm::ChatMessage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Deterministic cache key over the canonicalized call inputs. Wall-clock
/// time is deliberately excluded: identical requests inside the TTL window
/// are indistinguishable by design.
pub fn fingerprint(pipeline_id: &str, messages: &[ChatMessage], options: &CallOptions) -> String {
    // serde_json maps sort keys, struct fields serialize in declaration
    // order, and CallOptions skips unset fields: the serialization is
    // canonical without further normalization.
    let canonical = serde_json::json!({
        "pipeline": pipeline_id,
        "messages": messages,
        "options": options,
    });
    format!("{:x}", md5::compute(canonical.to_string()))
}

struct CacheEntry {
    result: ExecutionResult,
    inserted_at: Instant,
}

/// Fingerprint-keyed memo of completed successful executions.
///
/// Reads copy the stored result, so the periodic sweep can never invalidate
/// a value a caller is holding. Entries expire by TTL (collected by the
/// sweeper) and by an oldest-first size bound enforced on insert.
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Fresh-entry lookup. Expired entries read as misses and are left for
    /// the sweeper.
    pub fn get(&self, key: &str) -> Option<ExecutionResult> {
        let entries = self.entries.lock().expect("result cache lock poisoned");
        entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.result.clone())
    }

    /// Store a successful execution, evicting oldest entries past the size
    /// bound.
    pub fn insert(&self, key: String, result: ExecutionResult) {
        let mut entries = self.entries.lock().expect("result cache lock poisoned");
        entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );

        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Drop every expired entry; returns the eviction count.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().expect("result cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().expect("result cache lock poisoned");
        let cleared = entries.len();
        entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("result cache lock poisoned");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweep task. The task runs until `shutdown` is
    /// cancelled; the returned handle lets the owner await a clean stop.
    pub fn spawn_sweeper(
        cache: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = cache.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, "cache sweep removed expired entries");
                        }
                    }
                }
            }
            tracing::debug!("cache sweeper stopped");
        })
    }
}
