use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::generate::SourceCitation;

/// Which stage served a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStage {
    Exact,
    Normalized,
    Semantic,
}

impl CacheStage {
    /// Wire name, matching the response schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStage::Exact => "exact",
            CacheStage::Normalized => "normalized",
            CacheStage::Semantic => "semantic",
        }
    }
}

/// The payload a hit replays: answer text, citations, confidence.
#[derive(Debug, Clone, Serialize)]
pub struct CachedAnswer {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub confidence: f32,
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub answer: Arc<CachedAnswer>,
    pub stage: CacheStage,
    /// Cosine similarity to the matched entry (semantic hits only).
    pub similarity: Option<f32>,
}

/// Monotonic cache counters.
#[derive(Debug, Default)]
pub struct CacheCounters {
    pub exact_hits: AtomicU64,
    pub normalized_hits: AtomicU64,
    pub semantic_hits: AtomicU64,
    pub misses: AtomicU64,
    pub puts: AtomicU64,
    pub probe_failures: AtomicU64,
}

/// Point-in-time counter snapshot for the stats surface.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub exact_hits: u64,
    pub normalized_hits: u64,
    pub semantic_hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub probe_failures: u64,
}

impl CacheCounters {
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            normalized_hits: self.normalized_hits.load(Ordering::Relaxed),
            semantic_hits: self.semantic_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
        }
    }
}
