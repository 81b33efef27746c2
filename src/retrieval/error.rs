use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::vectordb::VectorDbError;

#[derive(Debug, Error)]
/// Errors that abort retrieval.
///
/// Sparse and reranker failures are handled inside the engine as degraded
/// modes; only the dense store and the embedder are load-bearing.
pub enum RetrievalError {
    /// Dense store failure. Fatal: answers cannot be grounded without it.
    #[error("dense store unavailable: {0}")]
    DenseUnavailable(#[from] VectorDbError),

    /// Query embedding failed.
    #[error("query embedding failed: {0}")]
    EmbeddingFailed(#[from] EmbeddingError),
}
