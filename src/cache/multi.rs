//! The three-stage cache facade.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use moka::sync::Cache;
use tracing::{debug, info, instrument};

use super::config::CacheConfig;
use super::semantic::{RetrieveIdsFn, SemanticCache, SemanticLookupOutcome};
use super::types::{CacheCounters, CacheHit, CacheStage, CacheStats, CachedAnswer};
use crate::hashing::hash_query;
use crate::normalize::normalize;

/// Exact + normalized + validated-semantic cache.
///
/// Lookups run in stage order and the first match wins. Stages A/B cost one
/// hash each; stage C costs an O(M) cosine scan plus one dense probe, and
/// runs only from the orchestrator's post-embedding checkpoint.
pub struct MultiStageCache {
    exact: Cache<[u8; 32], Arc<CachedAnswer>>,
    normalized: Cache<[u8; 32], Arc<CachedAnswer>>,
    semantic: SemanticCache,
    counters: CacheCounters,
}

impl MultiStageCache {
    pub fn new(retrieve_ids: RetrieveIdsFn, config: CacheConfig) -> Self {
        let build = || {
            Cache::builder()
                .max_capacity(config.exact_capacity)
                .time_to_live(config.exact_ttl)
                .build()
        };

        Self {
            exact: build(),
            normalized: build(),
            semantic: SemanticCache::new(retrieve_ids, config),
            counters: CacheCounters::default(),
        }
    }

    /// Stages A and B. Synchronous and cheap; runs before admission and
    /// before the query is embedded.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub fn lookup_fast(&self, query: &str) -> Option<CacheHit> {
        if let Some(answer) = self.exact.get(&hash_query(query)) {
            info!("exact cache hit");
            self.counters.exact_hits.fetch_add(1, Ordering::Relaxed);
            return Some(CacheHit {
                answer,
                stage: CacheStage::Exact,
                similarity: None,
            });
        }

        if let Some(answer) = self.normalized.get(&hash_query(&normalize(query))) {
            info!("normalized cache hit");
            self.counters
                .normalized_hits
                .fetch_add(1, Ordering::Relaxed);
            return Some(CacheHit {
                answer,
                stage: CacheStage::Normalized,
                similarity: None,
            });
        }

        debug!("fast cache stages missed");
        None
    }

    /// Stage C. Requires the query embedding; runs the validation probe.
    pub async fn lookup_semantic(&self, embedding: &[f32]) -> SemanticLookupOutcome {
        let outcome = self.semantic.lookup(embedding).await;

        if outcome.hit.is_some() {
            self.counters.semantic_hits.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.probe_failed {
            self.counters
                .probe_failures
                .fetch_add(1, Ordering::Relaxed);
        }

        outcome
    }

    /// Records a full miss (all stages failed for one query).
    pub fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Stores an answer for all three stages.
    ///
    /// Optimistic: a racing identical put wastes one computation, nothing
    /// more.
    #[instrument(skip_all, fields(query_len = query.len(), chunks = chunk_ids.len()))]
    pub fn put(
        &self,
        query: &str,
        embedding: Vec<f32>,
        chunk_ids: HashSet<String>,
        answer: CachedAnswer,
    ) {
        let answer = Arc::new(answer);

        self.exact.insert(hash_query(query), answer.clone());
        self.normalized
            .insert(hash_query(&normalize(query)), answer.clone());
        self.semantic.insert(query, embedding, chunk_ids, answer);

        self.counters.puts.fetch_add(1, Ordering::Relaxed);
        debug!("cache entry stored");
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    pub fn clear(&self) {
        self.exact.invalidate_all();
        self.normalized.invalidate_all();
        self.semantic.clear();
    }

    /// Runs pending maintenance in the underlying stores (tests).
    pub fn run_pending_tasks(&self) {
        self.exact.run_pending_tasks();
        self.normalized.run_pending_tasks();
    }
}

impl std::fmt::Debug for MultiStageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiStageCache")
            .field("exact_entries", &self.exact.entry_count())
            .field("normalized_entries", &self.normalized.entry_count())
            .field("semantic", &self.semantic)
            .finish()
    }
}

#[derive(Clone)]
/// Shared handle to a [`MultiStageCache`].
pub struct MultiStageCacheHandle {
    inner: Arc<MultiStageCache>,
}

impl MultiStageCacheHandle {
    pub fn new(cache: MultiStageCache) -> Self {
        Self {
            inner: Arc::new(cache),
        }
    }

    pub fn lookup_fast(&self, query: &str) -> Option<CacheHit> {
        self.inner.lookup_fast(query)
    }

    pub async fn lookup_semantic(&self, embedding: &[f32]) -> SemanticLookupOutcome {
        self.inner.lookup_semantic(embedding).await
    }

    pub fn record_miss(&self) {
        self.inner.record_miss();
    }

    pub fn put(
        &self,
        query: &str,
        embedding: Vec<f32>,
        chunk_ids: HashSet<String>,
        answer: CachedAnswer,
    ) {
        self.inner.put(query, embedding, chunk_ids, answer);
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for MultiStageCacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiStageCacheHandle")
            .field("strong_count", &self.strong_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_returning(ids_to_return: Vec<&str>) -> RetrieveIdsFn {
        let ids: Vec<String> = ids_to_return.into_iter().map(|s| s.to_string()).collect();
        Arc::new(move |_embedding, _k| {
            let ids = ids.clone();
            Box::pin(async move { Ok(ids) })
        })
    }

    fn answer(text: &str) -> CachedAnswer {
        CachedAnswer {
            answer: text.to_string(),
            sources: Vec::new(),
            confidence: 0.8,
        }
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_exact_hit_after_put() {
        let cache = MultiStageCache::new(probe_returning(vec![]), CacheConfig::default());

        cache.put(
            "What are the beard grooming standards?",
            vec![1.0, 0.0],
            ids(&["c12"]),
            answer("A1"),
        );

        let hit = cache
            .lookup_fast("What are the beard grooming standards?")
            .expect("exact hit");

        assert_eq!(hit.stage, CacheStage::Exact);
        assert_eq!(hit.answer.answer, "A1");
    }

    #[tokio::test]
    async fn test_normalized_hit_on_whitespace_and_case() {
        let cache = MultiStageCache::new(probe_returning(vec![]), CacheConfig::default());

        cache.put(
            "What are the beard grooming standards?",
            vec![1.0, 0.0],
            ids(&["c12"]),
            answer("A1"),
        );

        let hit = cache
            .lookup_fast("  WHAT are the beard grooming standards?  ")
            .expect("normalized hit");

        assert_eq!(hit.stage, CacheStage::Normalized);
        assert_eq!(hit.answer.answer, "A1");
    }

    #[tokio::test]
    async fn test_semantic_hit_via_validation() {
        let cache = MultiStageCache::new(
            probe_returning(vec!["c12", "c44", "c71"]),
            CacheConfig::default(),
        );

        cache.put(
            "What are the beard grooming standards?",
            vec![1.0, 0.0],
            ids(&["c12", "c44", "c71"]),
            answer("A1"),
        );

        assert!(
            cache
                .lookup_fast("What are the grooming rules for beards?")
                .is_none()
        );

        let outcome = cache.lookup_semantic(&[1.0, 0.0]).await;
        let hit = outcome.hit.expect("semantic hit");

        assert_eq!(hit.stage, CacheStage::Semantic);
        assert_eq!(hit.answer.answer, "A1");
    }

    #[tokio::test]
    async fn test_counters_track_stages() {
        let cache = MultiStageCache::new(
            probe_returning(vec!["c12"]),
            CacheConfig::default(),
        );

        cache.put("q", vec![1.0, 0.0], ids(&["c12"]), answer("A"));

        cache.lookup_fast("q");
        cache.lookup_fast("  Q  ");
        cache.lookup_semantic(&[1.0, 0.0]).await;
        cache.record_miss();

        let stats = cache.stats();
        assert_eq!(stats.exact_hits, 1);
        assert_eq!(stats.normalized_hits, 1);
        assert_eq!(stats.semantic_hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.puts, 1);
    }

    #[tokio::test]
    async fn test_clear_empties_all_stages() {
        let cache = MultiStageCache::new(probe_returning(vec!["c12"]), CacheConfig::default());

        cache.put("q", vec![1.0, 0.0], ids(&["c12"]), answer("A"));
        cache.clear();
        cache.run_pending_tasks();

        assert!(cache.lookup_fast("q").is_none());
        assert!(cache.lookup_semantic(&[1.0, 0.0]).await.hit.is_none());
    }
}
