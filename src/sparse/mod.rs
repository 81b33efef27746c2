//! Sparse (BM25-style) keyword index seam.
//!
//! The index itself is external; the core consumes it through
//! [`SparseIndex`]. Backends return stored fields alongside scores, the way
//! inverted-index engines serve documents, so fused results are rerankable
//! without a second fetch.

pub mod error;
pub mod http;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::SparseIndexError;
pub use http::HttpSparseIndex;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockSparseIndex;

use async_trait::async_trait;

use crate::vectordb::ChunkMeta;

/// One keyword-scored hit. Higher score is more relevant.
#[derive(Debug, Clone)]
pub struct SparseHit {
    pub score: f32,
    pub meta: ChunkMeta,
}

/// Abstract BM25-style index.
#[async_trait]
pub trait SparseIndex: Send + Sync {
    /// Top-k keyword search, sorted descending by score.
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<SparseHit>, SparseIndexError>;
}
