//! Adaptive retrieval: strategy dispatch, hybrid fusion, reranking.

pub mod engine;
pub mod error;
pub mod rrf;
pub mod types;
pub mod variants;

pub use engine::{EngineConfig, RetrievalEngine};
pub use error::RetrievalError;
pub use rrf::{fuse_ranked_lists, rrf_fuse};
pub use types::{
    RetrievalResult, RetrievalTimings, RetrievedDocument, Strategy, sort_by_final_score,
};
pub use variants::generate_variants;
