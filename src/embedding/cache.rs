//! Write-through embedding cache keyed by BLAKE3 of the text.
//!
//! Readers may observe a stale miss during a concurrent write; that costs one
//! redundant backend call, never a wrong vector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use tracing::debug;

use super::client::EmbeddingClient;
use super::error::EmbeddingError;
use crate::hashing::hash_query;

const DEFAULT_CAPACITY: u64 = 50_000;
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Caching wrapper around any [`EmbeddingClient`].
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingClient>,
    entries: Cache<[u8; 32], Arc<Vec<f32>>>,
}

impl CachedEmbedder {
    /// Wraps `inner` with the default capacity and TTL.
    pub fn new(inner: Arc<dyn EmbeddingClient>) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Wraps `inner` with explicit bounds.
    pub fn with_capacity(inner: Arc<dyn EmbeddingClient>, capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Number of cached vectors.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Drops all cached vectors.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl std::fmt::Debug for CachedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[async_trait]
impl EmbeddingClient for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = hash_query(text);

        if let Some(cached) = self.entries.get(&key) {
            debug!("embedding cache hit");
            return Ok(cached.as_ref().clone());
        }

        let vector = self.inner.embed(text).await?;
        self.entries.insert(key, Arc::new(vector.clone()));
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = hash_query(text);
            match self.entries.get(&key) {
                Some(cached) => results.push(Some(cached.as_ref().clone())),
                None => {
                    results.push(None);
                    missing.push((i, text.clone()));
                }
            }
        }

        if !missing.is_empty() {
            let texts_to_embed: Vec<String> = missing.iter().map(|(_, t)| t.clone()).collect();
            let vectors = self.inner.embed_batch(&texts_to_embed).await?;

            if vectors.len() != missing.len() {
                return Err(EmbeddingError::CountMismatch {
                    submitted: missing.len(),
                    returned: vectors.len(),
                });
            }

            for ((index, text), vector) in missing.into_iter().zip(vectors) {
                self.entries
                    .insert(hash_query(&text), Arc::new(vector.clone()));
                results[index] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }
}
