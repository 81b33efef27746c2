//! Stage C: validated semantic matching.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::config::CacheConfig;
use super::types::{CacheHit, CacheStage, CachedAnswer};
use crate::embedding::cosine_similarity;

/// Injected dense-probe callback: `(embedding, k) -> chunk ids`.
///
/// The cache validates semantic candidates through this seam instead of
/// holding the retrieval engine itself; construction wires it in, and the
/// cache never owns the engine.
pub type RetrieveIdsFn =
    Arc<dyn Fn(Vec<f32>, usize) -> BoxFuture<'static, Result<Vec<String>, String>> + Send + Sync>;

/// Jaccard overlap `|A ∩ B| / |A ∪ B|`; 0.0 when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

struct SemanticEntry {
    query: String,
    embedding: Vec<f32>,
    chunk_ids: HashSet<String>,
    answer: Arc<CachedAnswer>,
    expires_at: Instant,
}

/// Outcome of a semantic lookup; `probe_failed` marks a degraded validation
/// probe (reported, never fatal).
#[derive(Debug, Default)]
pub struct SemanticLookupOutcome {
    pub hit: Option<CacheHit>,
    pub probe_failed: bool,
}

/// Ring of recent entries scanned by cosine, validated by document overlap.
pub struct SemanticCache {
    entries: RwLock<VecDeque<SemanticEntry>>,
    retrieve_ids: RetrieveIdsFn,
    config: CacheConfig,
}

impl SemanticCache {
    pub fn new(retrieve_ids: RetrieveIdsFn, config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            retrieve_ids,
            config,
        }
    }

    /// Live (non-expired) entry count.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .iter()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Stores an entry for future semantic matching.
    ///
    /// Entries without retrieved chunk ids are rejected: overlap validation
    /// would have nothing to compare, so they must never serve as semantic
    /// candidates.
    pub fn insert(
        &self,
        query: &str,
        embedding: Vec<f32>,
        chunk_ids: HashSet<String>,
        answer: Arc<CachedAnswer>,
    ) {
        if chunk_ids.is_empty() {
            debug!("skipping semantic insert: no retrieved chunk ids");
            return;
        }

        let now = Instant::now();
        let entry = SemanticEntry {
            query: query.to_string(),
            embedding,
            chunk_ids,
            answer,
            expires_at: now + self.config.semantic_ttl,
        };

        let mut entries = self.entries.write();
        entries.retain(|e| e.expires_at > now);
        entries.push_front(entry);
        entries.truncate(self.config.semantic_candidates);
    }

    /// Scans recent entries for a validated match.
    ///
    /// One dense probe runs for the current query; every surviving candidate
    /// is validated against that single id set, and the highest-similarity
    /// one that passes the overlap gate wins.
    #[instrument(skip(self, embedding))]
    pub async fn lookup(&self, embedding: &[f32]) -> SemanticLookupOutcome {
        if !self.config.enable_semantic {
            return SemanticLookupOutcome::default();
        }

        let now = Instant::now();
        let mut candidates: Vec<(f32, HashSet<String>, Arc<CachedAnswer>, String)> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|e| e.expires_at > now)
                .take(self.config.semantic_candidates)
                .filter_map(|e| {
                    let similarity = cosine_similarity(embedding, &e.embedding);
                    (similarity >= self.config.sim_threshold).then(|| {
                        (
                            similarity,
                            e.chunk_ids.clone(),
                            e.answer.clone(),
                            e.query.clone(),
                        )
                    })
                })
                .collect()
        };

        if candidates.is_empty() {
            return SemanticLookupOutcome::default();
        }

        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        debug!(
            candidates = candidates.len(),
            best_similarity = candidates[0].0,
            "semantic candidates above similarity gate"
        );

        // The validation probe runs once; overlap is computed per candidate
        // against the same live id set.
        let probe_ids = match (self.retrieve_ids)(embedding.to_vec(), self.config.probe_k).await {
            Ok(ids) => ids.into_iter().collect::<HashSet<String>>(),
            Err(message) => {
                warn!(message, "validation probe failed, treating as miss");
                return SemanticLookupOutcome {
                    hit: None,
                    probe_failed: true,
                };
            }
        };

        for (similarity, chunk_ids, answer, matched_query) in candidates {
            let overlap = jaccard(&probe_ids, &chunk_ids);
            if overlap >= self.config.overlap_threshold {
                info!(
                    similarity,
                    overlap,
                    matched_query_len = matched_query.len(),
                    "validated semantic hit"
                );
                return SemanticLookupOutcome {
                    hit: Some(CacheHit {
                        answer,
                        stage: CacheStage::Semantic,
                        similarity: Some(similarity),
                    }),
                    probe_failed: false,
                };
            }
            debug!(similarity, overlap, "candidate failed overlap validation");
        }

        SemanticLookupOutcome::default()
    }
}

impl std::fmt::Debug for SemanticCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("entries", &self.entries.read().len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> Arc<CachedAnswer> {
        Arc::new(CachedAnswer {
            answer: text.to_string(),
            sources: Vec::new(),
            confidence: 0.9,
        })
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn probe_returning(ids_to_return: Vec<String>) -> RetrieveIdsFn {
        Arc::new(move |_embedding, _k| {
            let ids = ids_to_return.clone();
            Box::pin(async move { Ok(ids) })
        })
    }

    fn failing_probe() -> RetrieveIdsFn {
        Arc::new(|_embedding, _k| Box::pin(async { Err("probe down".to_string()) }))
    }

    #[test]
    fn test_jaccard_values() {
        assert_eq!(jaccard(&ids(&["a", "b"]), &ids(&["a", "b"])), 1.0);
        assert_eq!(jaccard(&ids(&["a"]), &ids(&["b"])), 0.0);
        assert!((jaccard(&ids(&["a", "b", "c"]), &ids(&["a", "b", "c", "d"])) - 0.75) < 1e-6);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[tokio::test]
    async fn test_validated_hit() {
        let probe = probe_returning(vec!["c12".into(), "c44".into(), "c71".into()]);
        let cache = SemanticCache::new(probe, CacheConfig::default());

        cache.insert(
            "What are the beard grooming standards?",
            vec![1.0, 0.0],
            ids(&["c12", "c44", "c71"]),
            answer("A1"),
        );

        let outcome = cache.lookup(&[1.0, 0.0]).await;

        let hit = outcome.hit.expect("validated hit expected");
        assert_eq!(hit.stage, CacheStage::Semantic);
        assert_eq!(hit.answer.answer, "A1");
        assert!(hit.similarity.unwrap() > 0.99);
    }

    #[tokio::test]
    async fn test_overlap_below_threshold_misses() {
        // Probe returns a fourth chunk: Jaccard 3/4 = 0.75 < 0.80.
        let probe =
            probe_returning(vec!["c12".into(), "c44".into(), "c71".into(), "c88".into()]);
        let cache = SemanticCache::new(probe, CacheConfig::default());

        cache.insert(
            "What are the beard grooming standards?",
            vec![1.0, 0.0],
            ids(&["c12", "c44", "c71"]),
            answer("A1"),
        );

        let outcome = cache.lookup(&[1.0, 0.0]).await;

        assert!(outcome.hit.is_none());
        assert!(!outcome.probe_failed);
    }

    #[tokio::test]
    async fn test_spurious_similarity_zero_overlap_misses() {
        let probe = probe_returning(vec!["h01".into(), "h02".into(), "h03".into()]);
        let cache = SemanticCache::new(probe, CacheConfig::default());

        cache.insert(
            "What are social functions?",
            vec![1.0, 0.0],
            ids(&["s03", "s17", "s22"]),
            answer("wrong answer for this query"),
        );

        // Cosine is high (same direction) but the documents are disjoint.
        let outcome = cache.lookup(&[1.0, 0.0]).await;

        assert!(outcome.hit.is_none());
    }

    #[tokio::test]
    async fn test_below_similarity_gate_skips_probe() {
        let probe: RetrieveIdsFn = Arc::new(|_, _| {
            Box::pin(async { panic!("probe must not run when no candidate passes cosine") })
        });
        let cache = SemanticCache::new(probe, CacheConfig::default());

        cache.insert("q", vec![1.0, 0.0], ids(&["c1"]), answer("A"));

        // Orthogonal embedding: cosine 0.
        let outcome = cache.lookup(&[0.0, 1.0]).await;

        assert!(outcome.hit.is_none());
    }

    #[tokio::test]
    async fn test_probe_failure_degrades_to_miss() {
        let cache = SemanticCache::new(failing_probe(), CacheConfig::default());

        cache.insert("q", vec![1.0, 0.0], ids(&["c1"]), answer("A"));

        let outcome = cache.lookup(&[1.0, 0.0]).await;

        assert!(outcome.hit.is_none());
        assert!(outcome.probe_failed);
    }

    #[tokio::test]
    async fn test_empty_chunk_ids_rejected() {
        let probe = probe_returning(vec![]);
        let cache = SemanticCache::new(probe, CacheConfig::default());

        cache.insert("q", vec![1.0, 0.0], HashSet::new(), answer("A"));

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_ring_bounded_by_candidate_limit() {
        let probe = probe_returning(vec!["c1".into()]);
        let mut config = CacheConfig::default();
        config.semantic_candidates = 3;
        let cache = SemanticCache::new(probe, config);

        for i in 0..10 {
            cache.insert(&format!("q{i}"), vec![1.0, 0.0], ids(&["c1"]), answer("A"));
        }

        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_highest_similarity_passing_candidate_wins() {
        let probe = probe_returning(vec!["c1".into(), "c2".into()]);
        let mut config = CacheConfig::default();
        config.sim_threshold = 0.5;
        let cache = SemanticCache::new(probe, config);

        // Lower-similarity entry with perfect overlap.
        cache.insert(
            "older",
            vec![0.9, 0.435889894],
            ids(&["c1", "c2"]),
            answer("older answer"),
        );
        // Higher-similarity entry, also passing overlap.
        cache.insert(
            "newer",
            vec![1.0, 0.0],
            ids(&["c1", "c2"]),
            answer("newer answer"),
        );

        let outcome = cache.lookup(&[1.0, 0.0]).await;

        assert_eq!(outcome.hit.unwrap().answer.answer, "newer answer");
    }

    #[tokio::test]
    async fn test_disabled_semantic_stage() {
        let probe = probe_returning(vec!["c1".into()]);
        let mut config = CacheConfig::default();
        config.enable_semantic = false;
        let cache = SemanticCache::new(probe, config);

        cache.insert("q", vec![1.0, 0.0], ids(&["c1"]), answer("A"));

        let outcome = cache.lookup(&[1.0, 0.0]).await;

        assert!(outcome.hit.is_none());
    }
}
