use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by reranking backends.
pub enum RerankError {
    /// Backend HTTP request failed.
    #[error("rerank request to '{url}' failed: {message}")]
    RequestFailed {
        /// Backend URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Backend returned a malformed response.
    #[error("rerank response malformed: {message}")]
    MalformedResponse {
        /// Error message.
        message: String,
    },

    /// Backend returned the wrong number of scores.
    #[error("rerank score count mismatch: submitted {submitted}, got {returned}")]
    CountMismatch {
        /// Pairs submitted.
        submitted: usize,
        /// Scores returned.
        returned: usize,
    },

    /// LLM-based scoring failed.
    #[error("llm rerank failed: {message}")]
    LlmFailed {
        /// Error message.
        message: String,
    },
}
