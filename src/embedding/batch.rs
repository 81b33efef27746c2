//! Micro-batching for concurrent embed calls.
//!
//! Concurrent single-text embeds inside one batch window are coalesced into
//! one backend batch call. The window only delays a call when a second call
//! actually arrives behind it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use super::client::EmbeddingClient;
use super::error::EmbeddingError;

const BATCH_WINDOW: Duration = Duration::from_millis(10);
const MAX_BATCH: usize = 64;
const QUEUE_DEPTH: usize = 1024;

struct EmbedJob {
    text: String,
    reply: oneshot::Sender<Result<Vec<f32>, EmbeddingError>>,
}

/// Coalescing wrapper around any [`EmbeddingClient`].
pub struct BatchingEmbedder {
    inner: Arc<dyn EmbeddingClient>,
    tx: mpsc::Sender<EmbedJob>,
}

impl BatchingEmbedder {
    /// Wraps `inner` and spawns the batch worker. Must be called inside a
    /// tokio runtime.
    pub fn new(inner: Arc<dyn EmbeddingClient>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(batch_worker(inner.clone(), rx));
        Self { inner, tx }
    }
}

impl std::fmt::Debug for BatchingEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchingEmbedder")
            .field("dim", &self.inner.dim())
            .finish()
    }
}

async fn batch_worker(inner: Arc<dyn EmbeddingClient>, mut rx: mpsc::Receiver<EmbedJob>) {
    while let Some(first) = rx.recv().await {
        let mut jobs = vec![first];
        let deadline = Instant::now() + BATCH_WINDOW;

        while jobs.len() < MAX_BATCH {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) | Err(_) => break,
            }
        }

        let texts: Vec<String> = jobs.iter().map(|j| j.text.clone()).collect();
        debug!(batch = texts.len(), "embedding batch window closed");

        match inner.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == jobs.len() => {
                for (job, vector) in jobs.into_iter().zip(vectors) {
                    let _ = job.reply.send(Ok(vector));
                }
            }
            Ok(vectors) => {
                warn!(
                    submitted = jobs.len(),
                    returned = vectors.len(),
                    "embedding backend returned wrong batch size"
                );
                let submitted = jobs.len();
                let returned = vectors.len();
                for job in jobs {
                    let _ = job.reply.send(Err(EmbeddingError::CountMismatch {
                        submitted,
                        returned,
                    }));
                }
            }
            Err(e) => {
                let message = e.to_string();
                for job in jobs {
                    let _ = job.reply.send(Err(EmbeddingError::MalformedResponse {
                        message: message.clone(),
                    }));
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingClient for BatchingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EmbedJob {
                text: text.to_string(),
                reply,
            })
            .await
            .map_err(|_| EmbeddingError::WorkerGone)?;

        rx.await.map_err(|_| EmbeddingError::WorkerGone)?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        // Callers batching explicitly already amortize the call; bypass the window.
        self.inner.embed_batch(texts).await
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }
}
