//! In-memory BM25 mock for tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::SparseIndexError;
use super::{SparseHit, SparseIndex};
use crate::vectordb::ChunkMeta;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Small exact BM25 over seeded chunks.
pub struct MockSparseIndex {
    docs: RwLock<Vec<ChunkMeta>>,
    unavailable: AtomicBool,
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

impl MockSparseIndex {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Seeds one document.
    pub fn seed(&self, meta: ChunkMeta) {
        self.docs.write().push(meta);
    }

    /// Makes subsequent searches fail, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl Default for MockSparseIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockSparseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSparseIndex")
            .field("docs", &self.len())
            .finish()
    }
}

#[async_trait]
impl SparseIndex for MockSparseIndex {
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<SparseHit>, SparseIndexError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(SparseIndexError::Unavailable {
                message: "injected outage".to_string(),
            });
        }

        let docs = self.docs.read();
        let n = docs.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(&d.text)).collect();
        let avg_len: f32 =
            tokenized.iter().map(|t| t.len() as f32).sum::<f32>() / n as f32;

        let query_terms = tokenize(query_text);

        // Document frequency per query term.
        let mut df: HashMap<&str, usize> = HashMap::new();
        for term in &query_terms {
            let count = tokenized
                .iter()
                .filter(|tokens| tokens.iter().any(|t| t == term))
                .count();
            df.insert(term.as_str(), count);
        }

        let mut hits: Vec<SparseHit> = docs
            .iter()
            .zip(tokenized.iter())
            .filter_map(|(meta, tokens)| {
                let doc_len = tokens.len() as f32;
                let mut score = 0.0f32;

                for term in &query_terms {
                    let tf = tokens.iter().filter(|t| *t == term).count() as f32;
                    if tf == 0.0 {
                        continue;
                    }
                    let df = df[term.as_str()] as f32;
                    let idf = (((n as f32 - df + 0.5) / (df + 0.5)) + 1.0).ln();
                    let denom = tf + K1 * (1.0 - B + B * doc_len / avg_len.max(1.0));
                    score += idf * tf * (K1 + 1.0) / denom;
                }

                (score > 0.0).then(|| SparseHit {
                    score,
                    meta: meta.clone(),
                })
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, text: &str) -> ChunkMeta {
        ChunkMeta {
            chunk_id: id.to_string(),
            text: text.to_string(),
            source_file: "policy.pdf".to_string(),
            page: 1,
            chunk_index: 0,
        }
    }

    #[tokio::test]
    async fn test_keyword_match_ranks_first() {
        let index = MockSparseIndex::new();
        index.seed(meta("c1", "beard grooming standards for airmen"));
        index.seed(meta("c2", "uniform wear and appearance"));

        let hits = index.search("beard grooming", 5).await.unwrap();

        assert_eq!(hits[0].meta.chunk_id, "c1");
    }

    #[tokio::test]
    async fn test_no_match_returns_empty() {
        let index = MockSparseIndex::new();
        index.seed(meta("c1", "beard grooming standards"));

        let hits = index.search("zzzz qqqq", 5).await.unwrap();

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_rare_terms_outweigh_common() {
        let index = MockSparseIndex::new();
        index.seed(meta("c1", "policy policy policy tattoo"));
        index.seed(meta("c2", "policy policy policy policy"));
        index.seed(meta("c3", "policy guidance"));

        let hits = index.search("tattoo policy", 5).await.unwrap();

        assert_eq!(hits[0].meta.chunk_id, "c1");
    }

    #[tokio::test]
    async fn test_outage_injection() {
        let index = MockSparseIndex::new();
        index.set_unavailable(true);

        assert!(index.search("anything", 5).await.is_err());
    }
}
