//! End-to-end query orchestration.

pub mod error;
pub mod orchestrator;
pub mod types;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, PipelineConfig};
pub use types::{
    PipelineCounters, PipelineEvent, PipelineStats, QueryMode, QueryOptions, QueryOutcome,
    StageTimings,
};

use std::sync::Arc;

use crate::cache::RetrieveIdsFn;
use crate::retrieval::RetrievalEngine;

/// Builds the cache's validation-probe callback from a retrieval engine.
///
/// The cache keeps only this closure, never the engine itself, which breaks
/// the cache ↔ retrieval cycle at construction time.
pub fn retrieval_probe(engine: Arc<RetrievalEngine>) -> RetrieveIdsFn {
    Arc::new(move |embedding, k| {
        let engine = engine.clone();
        Box::pin(async move {
            engine
                .retrieve_ids_only(&embedding, k)
                .await
                .map_err(|e| e.to_string())
        })
    })
}
