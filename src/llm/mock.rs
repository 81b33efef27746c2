//! Mock LLM backend for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;

use super::client::{LlmClient, TokenStream};
use super::error::LlmError;
use super::types::{CompletionRequest, TokenChunk};

/// Scripted in-memory LLM.
///
/// Responses queued with [`push_response`](Self::push_response) are returned
/// in FIFO order; with an empty queue a deterministic echo of the prompt tail
/// is produced. `fail_next(n)` makes the next `n` calls fail, which exercises
/// the retry ladder.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failures_remaining: AtomicUsize,
    delay: Mutex<Duration>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Queues a canned response.
    pub fn push_response(&self, text: &str) {
        self.responses.lock().push_back(text.to_string());
    }

    /// Fails the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Adds artificial latency to every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Number of calls made (complete + stream).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    async fn respond(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LlmError::RequestFailed {
                url: "mock".to_string(),
                message: "injected failure".to_string(),
            });
        }

        if let Some(canned) = self.responses.lock().pop_front() {
            return Ok(canned);
        }

        let tail: String = request.prompt.chars().rev().take(48).collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Ok(format!("mock completion for: {tail}"))
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlmClient")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.respond(&request).await
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, LlmError> {
        let text = self.respond(&request).await?;

        // Split into word-sized chunks, keeping separators so concatenation
        // reproduces the full text.
        let mut chunks: Vec<Result<TokenChunk, LlmError>> = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            current.push(c);
            if c.is_whitespace() {
                chunks.push(Ok(TokenChunk::new(std::mem::take(&mut current))));
            }
        }
        if !current.is_empty() {
            chunks.push(Ok(TokenChunk::new(current)));
        }

        Ok(Box::pin(stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

/// Convenience alias used across tests.
pub type SharedMockLlm = Arc<MockLlmClient>;
