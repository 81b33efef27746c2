use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by embedding backends.
pub enum EmbeddingError {
    /// Backend HTTP request failed.
    #[error("embedding request to '{url}' failed: {message}")]
    RequestFailed {
        /// Backend URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Backend returned a malformed response.
    #[error("embedding response malformed: {message}")]
    MalformedResponse {
        /// Error message.
        message: String,
    },

    /// Backend returned a vector of the wrong dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Observed dimension.
        actual: usize,
    },

    /// Backend returned a different number of vectors than texts submitted.
    #[error("embedding count mismatch: submitted {submitted} texts, got {returned} vectors")]
    CountMismatch {
        /// Texts submitted.
        submitted: usize,
        /// Vectors returned.
        returned: usize,
    },

    /// The batching worker is gone.
    #[error("embedding batch worker unavailable")]
    WorkerGone,
}
