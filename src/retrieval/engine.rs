//! Strategy dispatch and execution.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::classify::{QueryExplanation, QueryType};
use crate::embedding::EmbeddingClient;
use crate::llm::LlmClient;
use crate::rerank::{TwoStageReranker, min_max_normalize};
use crate::sparse::SparseIndex;
use crate::vectordb::VectorStore;

use super::error::RetrievalError;
use super::rrf::{fuse_ranked_lists, rrf_fuse};
use super::types::{
    RetrievalResult, RetrievalTimings, RetrievedDocument, Strategy, sort_by_final_score,
};
use super::variants::generate_variants;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Dense k for the simple strategy.
    pub k_dense_simple: usize,
    /// Documents returned by the simple strategy.
    pub simple_top: usize,
    /// Dense k for hybrid retrieval.
    pub k_dense: usize,
    /// Sparse k for hybrid retrieval.
    pub k_sparse: usize,
    /// Fused candidates forwarded to reranking.
    pub k_fuse: usize,
    /// Documents returned after reranking.
    pub final_top: usize,
    /// Per-list k when fanning out over query variants.
    pub k_variant: usize,
    /// Aggregated candidates kept before reranking (advanced).
    pub advanced_pool: usize,
    /// Generate LLM query variants for complex queries.
    pub enable_query_variants: bool,
    /// Budget for the variant-generation call.
    pub variant_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k_dense_simple: 10,
            simple_top: 3,
            k_dense: 20,
            k_sparse: 20,
            k_fuse: 10,
            final_top: 5,
            k_variant: 15,
            advanced_pool: 10,
            enable_query_variants: true,
            variant_budget: Duration::from_millis(1500),
        }
    }
}

/// Adaptive retrieval engine: one dispatcher over the three strategies.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingClient>,
    vector_store: Arc<dyn VectorStore>,
    sparse_index: Option<Arc<dyn SparseIndex>>,
    reranker: TwoStageReranker,
    llm: Arc<dyn LlmClient>,
    config: EngineConfig,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        vector_store: Arc<dyn VectorStore>,
        sparse_index: Option<Arc<dyn SparseIndex>>,
        reranker: TwoStageReranker,
        llm: Arc<dyn LlmClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            sparse_index,
            reranker,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cheap dense probe returning chunk ids only.
    ///
    /// The semantic cache validates candidate hits through this before
    /// trusting them; it costs one k-NN call and no reranking.
    pub async fn retrieve_ids_only(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let hits = self.vector_store.search(embedding, k, None).await?;
        Ok(hits.into_iter().map(|h| h.meta.chunk_id).collect())
    }

    /// Runs the strategy chosen for `query_type` and returns ranked,
    /// explained, timed results.
    ///
    /// `prior_documents` (chunks from earlier conversation turns) join the
    /// rerank pool on the hybrid and advanced paths.
    #[instrument(skip_all, fields(query_len = query.len(), query_type = query_type.as_str()))]
    pub async fn retrieve(
        &self,
        query: &str,
        embedding: &[f32],
        query_type: QueryType,
        explanation: QueryExplanation,
        prior_documents: Vec<RetrievedDocument>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let strategy = Strategy::for_query_type(query_type);
        let started = Instant::now();

        let (documents, timings, degraded) = match strategy {
            Strategy::Simple => self.retrieve_simple(embedding).await?,
            Strategy::Hybrid => {
                self.retrieve_hybrid(query, embedding, prior_documents)
                    .await?
            }
            Strategy::Advanced => {
                self.retrieve_advanced(query, embedding, prior_documents)
                    .await?
            }
        };

        let mut timings = timings;
        timings.total_ms = started.elapsed().as_millis() as u64;

        info!(
            strategy = strategy.as_str(),
            documents = documents.len(),
            total_ms = timings.total_ms,
            "retrieval complete"
        );

        Ok(RetrievalResult {
            documents,
            strategy_used: strategy,
            query_type,
            explanation,
            timings,
            degraded,
        })
    }

    async fn retrieve_simple(
        &self,
        embedding: &[f32],
    ) -> Result<(Vec<RetrievedDocument>, RetrievalTimings, Vec<String>), RetrievalError> {
        let mut timings = RetrievalTimings::default();

        let dense_started = Instant::now();
        let hits = self
            .vector_store
            .search(embedding, self.config.k_dense_simple, None)
            .await?;
        timings.dense_ms = dense_started.elapsed().as_millis() as u64;

        let mut scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        min_max_normalize(&mut scores);

        let mut documents: Vec<RetrievedDocument> = hits
            .into_iter()
            .zip(scores)
            .map(|(hit, normalized)| {
                let mut doc = RetrievedDocument::from_dense(hit.meta, hit.score);
                doc.final_score = normalized;
                doc
            })
            .collect();

        sort_by_final_score(&mut documents);
        documents.truncate(self.config.simple_top);

        Ok((documents, timings, Vec::new()))
    }

    /// Dense + sparse fetch and RRF fusion for one query text.
    async fn fetch_fused(
        &self,
        query: &str,
        embedding: &[f32],
        k_dense: usize,
        k_sparse: usize,
        timings: &mut RetrievalTimings,
        degraded: &mut Vec<String>,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let dense_started = Instant::now();
        let dense_future = self.vector_store.search(embedding, k_dense, None);

        let sparse_future = async {
            match &self.sparse_index {
                Some(index) => Some(index.search(query, k_sparse).await),
                None => None,
            }
        };

        let (dense_result, sparse_result) = tokio::join!(dense_future, sparse_future);

        let dense_hits = dense_result?;
        timings.dense_ms += dense_started.elapsed().as_millis() as u64;

        let dense_docs: Vec<RetrievedDocument> = dense_hits
            .into_iter()
            .map(|h| RetrievedDocument::from_dense(h.meta, h.score))
            .collect();

        let sparse_docs: Vec<RetrievedDocument> = match sparse_result {
            Some(Ok(hits)) => hits
                .into_iter()
                .map(|h| RetrievedDocument::from_sparse(h.meta, h.score))
                .collect(),
            Some(Err(e)) => {
                warn!(error = %e, "sparse index unavailable, continuing dense-only");
                if !degraded.iter().any(|d| d == "sparse_index") {
                    degraded.push("sparse_index".to_string());
                }
                Vec::new()
            }
            None => Vec::new(),
        };

        Ok(rrf_fuse(dense_docs, sparse_docs))
    }

    /// Appends prior-turn documents not already in the pool.
    fn merge_prior(pool: &mut Vec<RetrievedDocument>, prior: Vec<RetrievedDocument>) {
        for doc in prior {
            if pool.iter().any(|d| d.meta.chunk_id == doc.meta.chunk_id) {
                continue;
            }
            let mut carried = RetrievedDocument::from_dense(doc.meta, 0.0);
            carried.dense_score = None;
            carried.final_score = 0.0;
            pool.push(carried);
        }
    }

    async fn retrieve_hybrid(
        &self,
        query: &str,
        embedding: &[f32],
        prior_documents: Vec<RetrievedDocument>,
    ) -> Result<(Vec<RetrievedDocument>, RetrievalTimings, Vec<String>), RetrievalError> {
        let mut timings = RetrievalTimings::default();
        let mut degraded = Vec::new();

        let mut fused = self
            .fetch_fused(
                query,
                embedding,
                self.config.k_dense,
                self.config.k_sparse,
                &mut timings,
                &mut degraded,
            )
            .await?;

        fused.truncate(self.config.k_fuse);
        Self::merge_prior(&mut fused, prior_documents);

        let rerank_started = Instant::now();
        let (documents, rerank_degraded) = self
            .reranker
            .rerank(query, fused, self.config.final_top)
            .await;
        timings.rerank_ms = rerank_started.elapsed().as_millis() as u64;
        degraded.extend(rerank_degraded);

        Ok((documents, timings, degraded))
    }

    async fn retrieve_advanced(
        &self,
        query: &str,
        embedding: &[f32],
        prior_documents: Vec<RetrievedDocument>,
    ) -> Result<(Vec<RetrievedDocument>, RetrievalTimings, Vec<String>), RetrievalError> {
        let mut timings = RetrievalTimings::default();
        let mut degraded = Vec::new();

        let variants = if self.config.enable_query_variants {
            let variants_started = Instant::now();
            let variants =
                generate_variants(self.llm.clone(), query, self.config.variant_budget).await;
            timings.variants_ms = variants_started.elapsed().as_millis() as u64;
            variants
        } else {
            Vec::new()
        };

        let mut lists = Vec::with_capacity(1 + variants.len());
        lists.push(
            self.fetch_fused(
                query,
                embedding,
                self.config.k_variant,
                self.config.k_variant,
                &mut timings,
                &mut degraded,
            )
            .await?,
        );

        for variant in &variants {
            // Variants get their own embeddings; a failed variant embed just
            // drops that list.
            let variant_embedding = match self.embedder.embed(variant).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "variant embedding failed, skipping variant");
                    continue;
                }
            };

            let list = self
                .fetch_fused(
                    variant,
                    &variant_embedding,
                    self.config.k_variant,
                    self.config.k_variant,
                    &mut timings,
                    &mut degraded,
                )
                .await?;
            lists.push(list);
        }

        debug!(lists = lists.len(), "aggregating variant result lists");
        let mut aggregated = fuse_ranked_lists(lists);
        aggregated.truncate(self.config.advanced_pool);
        Self::merge_prior(&mut aggregated, prior_documents);

        let rerank_started = Instant::now();
        let (documents, rerank_degraded) = self
            .reranker
            .rerank(query, aggregated, self.config.final_top)
            .await;
        timings.rerank_ms = rerank_started.elapsed().as_millis() as u64;
        degraded.extend(rerank_degraded);

        Ok((documents, timings, degraded))
    }
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("has_sparse", &self.sparse_index.is_some())
            .field("config", &self.config)
            .finish()
    }
}
