//! Multi-stage answer cache: exact, normalized, validated semantic.
//!
//! ```text
//! get(query) → A (exact hash) → B (normalized hash) → C (semantic + overlap validation)
//! ```
//!
//! Stages A and B are identity-grade: byte-identical or
//! normalization-identical queries share one intent by construction. Stage C
//! is where naive semantic caches go wrong: cosine similarity alone pairs
//! distinct questions with distinct correct answers. A candidate there is
//! only trusted after a live dense probe shows its stored chunk set still
//! overlaps what the current query retrieves (Jaccard >= threshold).

pub mod config;
pub mod error;
pub mod multi;
pub mod semantic;
pub mod types;

pub use config::CacheConfig;
pub use error::CacheError;
pub use multi::{MultiStageCache, MultiStageCacheHandle};
pub use semantic::{RetrieveIdsFn, SemanticCache, SemanticLookupOutcome, jaccard};
pub use types::{CacheHit, CacheStage, CacheStats, CachedAnswer};
