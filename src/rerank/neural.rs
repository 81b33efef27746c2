//! BGE-class neural reranker seam.
//!
//! Same contract as the cross-encoder but an order of magnitude faster, so
//! it is preferred for the second stage; the batched-LLM scorer is the
//! fallback when no neural backend is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::RerankError;

/// Fast relevance scorer over (query, document) pairs.
#[async_trait]
pub trait NeuralReranker: Send + Sync {
    /// Scores each document against the query, preserving order.
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError>;
}

#[derive(Serialize)]
struct NeuralRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct NeuralResponse {
    scores: Vec<f32>,
}

/// HTTP neural reranker backend (`POST /score`).
#[derive(Clone)]
pub struct HttpNeuralReranker {
    http: reqwest::Client,
    url: String,
}

impl HttpNeuralReranker {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/score", self.url)
    }
}

impl std::fmt::Debug for HttpNeuralReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNeuralReranker")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl NeuralReranker for HttpNeuralReranker {
    #[instrument(skip(self, query, documents), fields(pairs = documents.len()))]
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&NeuralRequest { query, documents })
            .send()
            .await
            .map_err(|e| RerankError::RequestFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| RerankError::RequestFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let parsed: NeuralResponse =
            response
                .json()
                .await
                .map_err(|e| RerankError::MalformedResponse {
                    message: e.to_string(),
                })?;

        if parsed.scores.len() != documents.len() {
            return Err(RerankError::CountMismatch {
                submitted: documents.len(),
                returned: parsed.scores.len(),
            });
        }

        Ok(parsed.scores)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockNeuralReranker;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{NeuralReranker, RerankError};

    /// Deterministic stand-in: scores by shared-word count with the query.
    pub struct MockNeuralReranker {
        unavailable: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockNeuralReranker {
        pub fn new() -> Self {
            Self {
                unavailable: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Default for MockNeuralReranker {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl NeuralReranker for MockNeuralReranker {
        async fn rerank(
            &self,
            query: &str,
            documents: &[String],
        ) -> Result<Vec<f32>, RerankError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(RerankError::RequestFailed {
                    url: "mock".to_string(),
                    message: "injected outage".to_string(),
                });
            }

            let query_words: Vec<String> = query
                .to_lowercase()
                .split_whitespace()
                .map(|w| w.to_string())
                .collect();

            Ok(documents
                .iter()
                .map(|d| {
                    let lowered = d.to_lowercase();
                    query_words
                        .iter()
                        .filter(|w| lowered.contains(w.as_str()))
                        .count() as f32
                })
                .collect())
        }
    }
}
