use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use super::error::EmbeddingError;
use super::unit_normalize;

/// Abstract embedding backend.
///
/// Implementations must return unit-norm vectors and be deterministic for
/// identical input within one model version.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch of texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Vector dimension produced by this backend.
    fn dim(&self) -> usize;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

/// HTTP embedding backend (TEI-style `POST /embed`).
#[derive(Clone)]
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    url: String,
    dim: usize,
}

impl HttpEmbeddingClient {
    /// Creates a client against `url`, expecting `dim`-component vectors.
    pub fn new(url: &str, dim: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            dim,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embed", self.url)
    }
}

impl std::fmt::Debug for HttpEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbeddingClient")
            .field("url", &self.url)
            .field("dim", &self.dim)
            .finish()
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            submitted: 1,
            returned: 0,
        })
    }

    #[instrument(skip(self, texts), fields(batch = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&EmbedRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let response = response
            .error_for_status()
            .map_err(|e| EmbeddingError::RequestFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let mut vectors: Vec<Vec<f32>> =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::MalformedResponse {
                    message: e.to_string(),
                })?;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                submitted: texts.len(),
                returned: vectors.len(),
            });
        }

        for vector in &mut vectors {
            if vector.len() != self.dim {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dim,
                    actual: vector.len(),
                });
            }
            // Backends are expected to unit-normalize already; re-normalizing
            // is idempotent for those and corrects the rest.
            unit_normalize(vector);
        }

        debug!(vectors = vectors.len(), "embedding batch complete");
        Ok(vectors)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
