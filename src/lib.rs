//! # Regent
//!
//! Adaptive retrieval engine and multi-stage semantic cache for
//! policy-document question answering.
//!
//! Regent sits between a client and an indexed corpus of long-form
//! regulatory documents.
//!
//! ```text
//! Query → Cache (exact → normalized → validated-semantic)
//!       → Classify → Retrieve (simple | hybrid | advanced) → Rerank
//!       → Generate (grounded, streaming) → Confidence → Cache put
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use regent::Config;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `mock` | Mock backends for tests/examples |
//!
//! ## Modules
//!
//! - [`cache`] - Exact, normalized, and validated-semantic answer cache
//! - [`classify`] - Query complexity scoring
//! - [`config`] - Environment-backed configuration
//! - [`conversation`] - Sliding-window memory + follow-up handling
//! - [`embedding`] - Embedding client, cache, batching
//! - [`gateway`] - HTTP surface (Axum)
//! - [`generate`] - Grounded generation, streaming, confidence
//! - [`llm`] - LLM client with retries and admission
//! - [`pipeline`] - End-to-end orchestration
//! - [`rerank`] - Two-stage reranking
//! - [`retrieval`] - Strategy dispatch and hybrid fusion
//! - [`sparse`] - Sparse (BM25) index seam
//! - [`vectordb`] - Dense store (Qdrant)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod classify;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod embedding;
pub mod gateway;
pub mod generate;
pub mod hashing;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod rerank;
pub mod retrieval;
pub mod sparse;
pub mod vectordb;

pub use cache::{
    CacheConfig, CacheError, CacheHit, CacheStage, CacheStats, CachedAnswer, MultiStageCache,
    MultiStageCacheHandle, RetrieveIdsFn, SemanticCache, SemanticLookupOutcome, jaccard,
};
pub use classify::{FeatureContribution, QueryExplanation, QueryType, classify};
pub use config::{CacheOptions, Config, ConfigError};
pub use constants::{DEFAULT_EMBEDDING_DIM, DimValidationError, validate_embedding_dim};
pub use conversation::{
    ConversationConfig, ConversationContext, ConversationExchange, ConversationMemory,
    ConversationMemoryHandle, ConversationStats, detect_followup,
};
pub use embedding::{
    BatchingEmbedder, CachedEmbedder, EmbeddingClient, EmbeddingError, HttpEmbeddingClient,
    cosine_similarity, unit_normalize,
};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbeddingClient;
pub use gateway::{AppState, create_router};
pub use generate::{
    Answer, AnswerGenerator, GENERATION_FAILED_TEXT, GeneratorConfig, NO_INFORMATION_TEXT,
    SourceCitation, build_answer_prompt,
};
pub use hashing::{hash_query, hash_to_u64};
pub use llm::{
    CompletionRequest, GovernorConfig, HttpLlmClient, LlmClient, LlmError, RetryingLlmClient,
    TokenChunk, TokenStream,
};
#[cfg(any(test, feature = "mock"))]
pub use llm::MockLlmClient;
pub use normalize::normalize;
pub use pipeline::{
    Orchestrator, PipelineConfig, PipelineError, PipelineStats, QueryMode, QueryOptions,
    QueryOutcome, StageTimings, retrieval_probe,
};
pub use rerank::{
    CrossEncoder, HttpCrossEncoder, HttpNeuralReranker, NeuralReranker, RerankError,
    TwoStageConfig, TwoStageReranker,
};
#[cfg(any(test, feature = "mock"))]
pub use rerank::{MockCrossEncoder, MockNeuralReranker};
pub use retrieval::{
    EngineConfig, RetrievalEngine, RetrievalError, RetrievalResult, RetrievalTimings,
    RetrievedDocument, Strategy,
};
#[cfg(any(test, feature = "mock"))]
pub use sparse::MockSparseIndex;
pub use sparse::{SparseHit, SparseIndex, SparseIndexError};
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockVectorStore;
pub use vectordb::{ChunkMeta, QdrantStore, SearchFilter, SearchHit, VectorDbError, VectorStore};
