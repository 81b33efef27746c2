use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::cache::CacheStage;
use crate::classify::{QueryExplanation, QueryType};
use crate::generate::Answer;
use crate::retrieval::Strategy;

use super::error::PipelineError;

/// Requested routing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Always take the simple (dense-only) path.
    Simple,
    /// Classify and route per query.
    #[default]
    Adaptive,
}

/// Per-query options from the API surface.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub mode: QueryMode,
    pub use_conversation: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            mode: QueryMode::Adaptive,
            use_conversation: true,
        }
    }
}

/// Wall time spent per pipeline stage, milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub cache_lookup: u64,
    pub embedding: u64,
    pub retrieval: u64,
    pub rerank: u64,
    pub generation: u64,
    pub total: u64,
}

/// Everything one query produced.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query_id: String,
    pub answer: Answer,
    pub query_type: QueryType,
    pub strategy_used: Strategy,
    pub cache_hit: bool,
    pub cache_stage: Option<CacheStage>,
    pub timings: StageTimings,
    pub explanation: Option<QueryExplanation>,
    pub degraded: Vec<String>,
}

/// One event on a streaming query.
#[derive(Debug)]
pub enum PipelineEvent {
    Token(String),
    Done(Box<QueryOutcome>),
    /// Terminal failure after the stream already started.
    Failed(PipelineError),
}

/// Monotonic pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub queries: AtomicU64,
    pub simple_queries: AtomicU64,
    pub hybrid_queries: AtomicU64,
    pub advanced_queries: AtomicU64,
    pub rejected: AtomicU64,
    pub timeouts: AtomicU64,
    pub generation_failures: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl PipelineCounters {
    pub fn record_strategy(&self, strategy: Strategy) {
        match strategy {
            Strategy::Simple => self.simple_queries.fetch_add(1, Ordering::Relaxed),
            Strategy::Hybrid => self.hybrid_queries.fetch_add(1, Ordering::Relaxed),
            Strategy::Advanced => self.advanced_queries.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> PipelineStats {
        let queries = self.queries.load(Ordering::Relaxed);
        let total_latency_ms = self.total_latency_ms.load(Ordering::Relaxed);
        PipelineStats {
            queries,
            simple_queries: self.simple_queries.load(Ordering::Relaxed),
            hybrid_queries: self.hybrid_queries.load(Ordering::Relaxed),
            advanced_queries: self.advanced_queries.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
            mean_latency_ms: if queries > 0 {
                total_latency_ms / queries
            } else {
                0
            },
        }
    }
}

/// Point-in-time pipeline stats for the debug surface.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PipelineStats {
    pub queries: u64,
    pub simple_queries: u64,
    pub hybrid_queries: u64,
    pub advanced_queries: u64,
    pub rejected: u64,
    pub timeouts: u64,
    pub generation_failures: u64,
    pub mean_latency_ms: u64,
}
