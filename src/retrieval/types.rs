use serde::Serialize;

use crate::classify::{QueryExplanation, QueryType};
use crate::vectordb::ChunkMeta;

/// Retrieval strategy, chosen from the query's complexity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Simple,
    Hybrid,
    Advanced,
}

impl Strategy {
    /// Maps a complexity bucket onto its strategy.
    pub fn for_query_type(query_type: QueryType) -> Self {
        match query_type {
            QueryType::Simple => Strategy::Simple,
            QueryType::Moderate => Strategy::Hybrid,
            QueryType::Complex => Strategy::Advanced,
        }
    }

    /// Wire name, matching the response schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::Hybrid => "hybrid",
            Strategy::Advanced => "advanced",
        }
    }
}

/// A chunk annotated with per-stage scoring, ephemeral to one query.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub meta: ChunkMeta,
    pub dense_score: Option<f32>,
    pub sparse_score: Option<f32>,
    pub cross_encoder_score: Option<f32>,
    pub rerank_score: Option<f32>,
    pub final_score: f32,
}

impl RetrievedDocument {
    /// Starts a document from a dense hit.
    pub fn from_dense(meta: ChunkMeta, score: f32) -> Self {
        Self {
            meta,
            dense_score: Some(score),
            sparse_score: None,
            cross_encoder_score: None,
            rerank_score: None,
            final_score: score,
        }
    }

    /// Starts a document from a sparse hit.
    pub fn from_sparse(meta: ChunkMeta, score: f32) -> Self {
        Self {
            meta,
            dense_score: None,
            sparse_score: Some(score),
            cross_encoder_score: None,
            rerank_score: None,
            final_score: score,
        }
    }

    pub fn chunk_id(&self) -> &str {
        &self.meta.chunk_id
    }
}

/// Per-stage retrieval wall times, milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RetrievalTimings {
    pub dense_ms: u64,
    pub sparse_ms: u64,
    pub variants_ms: u64,
    pub rerank_ms: u64,
    pub total_ms: u64,
}

/// Ordered retrieval output plus its audit trail.
///
/// Documents are sorted by `final_score` descending, ties broken by
/// `chunk_id` ascending.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub documents: Vec<RetrievedDocument>,
    pub strategy_used: Strategy,
    pub query_type: QueryType,
    pub explanation: QueryExplanation,
    pub timings: RetrievalTimings,
    /// Names of collaborators that failed and were routed around.
    pub degraded: Vec<String>,
}

impl RetrievalResult {
    /// Chunk ids in rank order.
    pub fn chunk_ids(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|d| d.meta.chunk_id.clone())
            .collect()
    }
}

/// Sorts documents by final score descending, ties on chunk id.
pub fn sort_by_final_score(documents: &mut [RetrievedDocument]) {
    documents.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.meta.chunk_id.cmp(&b.meta.chunk_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument::from_dense(
            ChunkMeta {
                chunk_id: id.to_string(),
                text: String::new(),
                source_file: String::new(),
                page: 0,
                chunk_index: 0,
            },
            score,
        )
    }

    #[test]
    fn test_strategy_mapping() {
        assert_eq!(
            Strategy::for_query_type(QueryType::Simple),
            Strategy::Simple
        );
        assert_eq!(
            Strategy::for_query_type(QueryType::Moderate),
            Strategy::Hybrid
        );
        assert_eq!(
            Strategy::for_query_type(QueryType::Complex),
            Strategy::Advanced
        );
    }

    #[test]
    fn test_sort_descending_with_tiebreak() {
        let mut docs = vec![doc("b", 0.5), doc("a", 0.5), doc("c", 0.9)];

        sort_by_final_score(&mut docs);

        let ids: Vec<&str> = docs.iter().map(|d| d.chunk_id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
