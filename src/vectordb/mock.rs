//! In-memory mock vector store for tests.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::client::VectorStore;
use super::error::VectorDbError;
use super::model::{ChunkMeta, SearchFilter, SearchHit};
use crate::embedding::cosine_similarity;

/// Exact cosine k-NN over an in-memory chunk list.
pub struct MockVectorStore {
    chunks: RwLock<Vec<(ChunkMeta, Vec<f32>)>>,
    unavailable: AtomicBool,
    searches: AtomicUsize,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            searches: AtomicUsize::new(0),
        }
    }

    /// Seeds one chunk without going through `upsert`.
    pub fn seed(&self, meta: ChunkMeta, embedding: Vec<f32>) {
        self.chunks.write().push((meta, embedding));
    }

    /// Makes all subsequent operations fail, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Number of searches served.
    pub fn search_count(&self) -> usize {
        self.searches.load(AtomicOrdering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    fn check_available(&self) -> Result<(), VectorDbError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(VectorDbError::ConnectionFailed {
                url: "mock".to_string(),
                message: "injected outage".to_string(),
            });
        }
        Ok(())
    }

    fn matches(meta: &ChunkMeta, filter: Option<&SearchFilter>) -> bool {
        let Some(filter) = filter else {
            return true;
        };

        if let Some(ref source_file) = filter.source_file {
            if meta.source_file != *source_file {
                return false;
            }
        }

        if let Some((from, to)) = filter.page_range {
            if meta.page < from || meta.page > to {
                return false;
            }
        }

        true
    }
}

impl Default for MockVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockVectorStore")
            .field("chunks", &self.len())
            .finish()
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        self.check_available()?;
        self.searches.fetch_add(1, AtomicOrdering::SeqCst);

        let mut hits: Vec<SearchHit> = self
            .chunks
            .read()
            .iter()
            .filter(|(meta, _)| Self::matches(meta, filter))
            .map(|(meta, vector)| SearchHit {
                score: cosine_similarity(embedding, vector),
                meta: meta.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.meta.chunk_id.cmp(&b.meta.chunk_id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn upsert(&self, meta: ChunkMeta, embedding: Vec<f32>) -> Result<(), VectorDbError> {
        self.check_available()?;

        let mut chunks = self.chunks.write();
        chunks.retain(|(m, _)| m.chunk_id != meta.chunk_id);
        chunks.push((meta, embedding));
        Ok(())
    }

    async fn delete(&self, chunk_id: &str) -> Result<(), VectorDbError> {
        self.check_available()?;
        self.chunks.write().retain(|(m, _)| m.chunk_id != chunk_id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        self.check_available()
    }
}
