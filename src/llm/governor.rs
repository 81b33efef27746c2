//! Retry, timeout, and admission wrapper for LLM backends.
//!
//! At most `max_concurrent` completions run at once; excess callers queue on
//! the semaphore. Failed calls retry with exponential backoff. A streaming
//! permit is held until the stream is dropped.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

use super::client::{LlmClient, TokenStream};
use super::error::LlmError;
use super::types::{CompletionRequest, TokenChunk};

#[derive(Debug, Clone, Copy)]
pub struct GovernorConfig {
    /// Concurrent completions allowed.
    pub max_concurrent: usize,
    /// Per-call budget.
    pub call_timeout: Duration,
    /// Total attempts (first try included).
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            call_timeout: Duration::from_secs(90),
            // First try plus three retries, backing off 1s, 2s, 4s.
            max_attempts: 4,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// [`LlmClient`] wrapper adding retries, timeouts, and a concurrency cap.
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    permits: Arc<Semaphore>,
    config: GovernorConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: GovernorConfig) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
        }
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, LlmError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LlmError::Cancelled)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        // 1s, 2s, 4s, ... capped well below any sane deadline.
        self.config.backoff_base * 2u32.saturating_pow(attempt)
    }
}

impl std::fmt::Debug for RetryingLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingLlmClient")
            .field("model", &self.inner.model_name())
            .field("config", &self.config)
            .finish()
    }
}

/// Stream wrapper that keeps its admission permit alive until dropped.
struct PermittedStream {
    inner: TokenStream,
    _permit: OwnedSemaphorePermit,
}

impl Stream for PermittedStream {
    type Item = Result<TokenChunk, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    #[instrument(skip(self, request), fields(model = %self.inner.model_name()))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let _permit = self.acquire().await?;

        let mut last_error = String::new();
        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying completion");
                sleep(delay).await;
            }

            match timeout(self.config.call_timeout, self.inner.complete(request.clone())).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "completion attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(attempt, "completion attempt timed out");
                    last_error = LlmError::Timeout {
                        seconds: self.config.call_timeout.as_secs(),
                    }
                    .to_string();
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    #[instrument(skip(self, request), fields(model = %self.inner.model_name()))]
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, LlmError> {
        let permit = self.acquire().await?;

        // Retries cover stream initiation only; once tokens flow, errors
        // propagate to the consumer.
        let mut last_error = String::new();
        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                sleep(self.backoff(attempt - 1)).await;
            }

            match timeout(self.config.call_timeout, self.inner.stream(request.clone())).await {
                Ok(Ok(inner)) => {
                    return Ok(Box::pin(PermittedStream {
                        inner,
                        _permit: permit,
                    }));
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "stream init attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(attempt, "stream init attempt timed out");
                    last_error = LlmError::Timeout {
                        seconds: self.config.call_timeout.as_secs(),
                    }
                    .to_string();
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
