use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::error::LlmError;
use super::types::{CompletionRequest, TokenChunk};

/// A lazy, finite, non-restartable sequence of token chunks.
///
/// Dropping the stream aborts the underlying call; no further tokens are
/// produced.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<TokenChunk, LlmError>> + Send>>;

/// Abstract LLM backend.
///
/// Temperature-0 requests must be deterministic within a model version.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Runs a completion to completion and returns the full text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    /// Starts a completion and returns its token stream.
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
