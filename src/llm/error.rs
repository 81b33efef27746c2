use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by LLM backends.
pub enum LlmError {
    /// Backend HTTP request failed.
    #[error("llm request to '{url}' failed: {message}")]
    RequestFailed {
        /// Backend URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Backend returned a malformed body or stream frame.
    #[error("llm response malformed: {message}")]
    MalformedResponse {
        /// Error message.
        message: String,
    },

    /// Call exceeded its timeout.
    #[error("llm call timed out after {seconds}s")]
    Timeout {
        /// Budget that was exceeded.
        seconds: u64,
    },

    /// All retries exhausted.
    #[error("llm retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Final attempt's error.
        last_error: String,
    },

    /// The request was cancelled before completion.
    #[error("llm call cancelled")]
    Cancelled,
}
