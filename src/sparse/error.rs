use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by sparse index backends.
pub enum SparseIndexError {
    /// Backend is unreachable or failed mid-query.
    #[error("sparse index unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// Query could not be processed.
    #[error("sparse query failed: {message}")]
    QueryFailed {
        /// Error message.
        message: String,
    },
}
