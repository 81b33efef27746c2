//! Cross-encoder scoring of (query, document) pairs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::RerankError;

/// Joint (query, document) scorer. Slower than a dual encoder, sharper than
/// cosine; scores are model-specific logits, comparable only within one call.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Scores each document against the query, preserving order.
    async fn score_pairs(&self, query: &str, documents: &[String])
    -> Result<Vec<f32>, RerankError>;
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RerankEntry {
    index: usize,
    score: f32,
}

/// HTTP cross-encoder backend (TEI-style `POST /rerank`).
#[derive(Clone)]
pub struct HttpCrossEncoder {
    http: reqwest::Client,
    url: String,
}

impl HttpCrossEncoder {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rerank", self.url)
    }
}

impl std::fmt::Debug for HttpCrossEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCrossEncoder")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    #[instrument(skip(self, query, documents), fields(pairs = documents.len()))]
    async fn score_pairs(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<f32>, RerankError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&RerankRequest {
                query,
                texts: documents,
            })
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

        let entries: Vec<RerankEntry> =
            response
                .json()
                .await
                .map_err(|e| RerankError::MalformedResponse {
                    message: e.to_string(),
                })?;

        if entries.len() != documents.len() {
            return Err(RerankError::CountMismatch {
                submitted: documents.len(),
                returned: entries.len(),
            });
        }

        // The backend returns entries sorted by score; restore input order.
        let mut scores = vec![0.0f32; documents.len()];
        for entry in entries {
            let slot = scores
                .get_mut(entry.index)
                .ok_or_else(|| RerankError::MalformedResponse {
                    message: format!("score index {} out of range", entry.index),
                })?;
            *slot = entry.score;
        }

        Ok(scores)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockCrossEncoder;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{CrossEncoder, RerankError};

    /// Deterministic lexical-overlap scorer standing in for a cross-encoder.
    pub struct MockCrossEncoder {
        unavailable: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockCrossEncoder {
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

        fn overlap(query: &str, document: &str) -> f32 {
            let q: HashSet<String> = query
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string())
                .collect();
            let d: HashSet<String> = document
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string())
                .collect();

            if q.is_empty() {
                return 0.0;
            }
            q.intersection(&d).count() as f32 / q.len() as f32
        }
    }

    impl Default for MockCrossEncoder {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CrossEncoder for MockCrossEncoder {
        async fn score_pairs(
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

            Ok(documents
                .iter()
                .map(|d| Self::overlap(query, d))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_scores_overlap() {
        let encoder = MockCrossEncoder::new();
        let docs = vec![
            "beard grooming standards".to_string(),
            "unrelated content entirely".to_string(),
        ];

        let scores = encoder.score_pairs("beard grooming", &docs).await.unwrap();

        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn test_mock_outage() {
        let encoder = MockCrossEncoder::new();
        encoder.set_unavailable(true);

        let result = encoder.score_pairs("q", &["d".to_string()]).await;
        assert!(result.is_err());
    }
}
