//! Mock embedding backend for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::client::EmbeddingClient;
use super::error::EmbeddingError;
use super::unit_normalize;
use crate::hashing::hash_query;

/// Deterministic in-memory embedder.
///
/// Produces a unit-norm vector derived from the BLAKE3 hash of the text, so
/// identical texts always embed identically and distinct texts are nearly
/// orthogonal in expectation. Tests that need controlled cosine similarity
/// can pin explicit vectors with [`set_embedding`](Self::set_embedding).
pub struct MockEmbeddingClient {
    dim: usize,
    pinned: Arc<RwLock<HashMap<String, Vec<f32>>>>,
    calls: AtomicUsize,
    embedded_texts: Arc<RwLock<Vec<String>>>,
    fail: AtomicBool,
}

impl MockEmbeddingClient {
    /// Creates a mock producing `dim`-component vectors.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            pinned: Arc::new(RwLock::new(HashMap::new())),
            calls: AtomicUsize::new(0),
            embedded_texts: Arc::new(RwLock::new(Vec::new())),
            fail: AtomicBool::new(false),
        }
    }

    /// Pins an explicit vector for `text` (unit-normalized on insert).
    pub fn set_embedding(&self, text: &str, mut vector: Vec<f32>) {
        unit_normalize(&mut vector);
        self.pinned.write().insert(text.to_string(), vector);
    }

    /// Number of backend calls made (single or batch).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text embedded so far, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded_texts.read().clone()
    }

    /// Makes subsequent calls fail when `fail` is true.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn derive(&self, text: &str) -> Vec<f32> {
        if let Some(pinned) = self.pinned.read().get(text) {
            return pinned.clone();
        }

        let hash = hash_query(text);
        let mut vector: Vec<f32> = (0..self.dim)
            .map(|i| {
                let byte = hash[i % 32];
                // Spread bytes into [-1, 1), offset per lane so long vectors
                // do not repeat with period 32.
                let lane = (i / 32) as f32 + 1.0;
                (byte as f32 / 128.0 - 1.0) / lane
            })
            .collect();
        unit_normalize(&mut vector);
        vector
    }
}

impl std::fmt::Debug for MockEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEmbeddingClient")
            .field("dim", &self.dim)
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::RequestFailed {
                url: "mock".to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.embedded_texts.write().push(text.to_string());
        Ok(self.derive(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::RequestFailed {
                url: "mock".to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.embedded_texts.write().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| self.derive(t)).collect())
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
