use std::time::Duration;

use crate::config::CacheOptions;

/// Cache behavior knobs, derived from [`CacheOptions`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Lifetime of exact and normalized entries.
    pub exact_ttl: Duration,
    /// Lifetime of semantic-match candidacy.
    pub semantic_ttl: Duration,
    /// Cosine similarity gate for semantic candidates.
    pub sim_threshold: f32,
    /// Jaccard overlap gate for accepting a semantic hit.
    pub overlap_threshold: f32,
    /// Maximum recent entries scanned per semantic lookup.
    pub semantic_candidates: usize,
    /// Disables the semantic stage entirely.
    pub enable_semantic: bool,
    /// Exact/normalized entry capacity.
    pub exact_capacity: u64,
    /// k for the validation dense probe.
    pub probe_k: usize,
}

impl CacheConfig {
    pub fn from_options(options: &CacheOptions) -> Self {
        Self {
            exact_ttl: Duration::from_secs(options.exact_ttl_sec),
            semantic_ttl: Duration::from_secs(options.semantic_ttl_sec),
            sim_threshold: options.sim_threshold,
            overlap_threshold: options.overlap_threshold,
            semantic_candidates: options.semantic_candidates,
            enable_semantic: options.enable_semantic,
            exact_capacity: 10_000,
            probe_k: 5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_options(&CacheOptions::default())
    }
}
