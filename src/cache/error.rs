use thiserror::Error;

#[derive(Debug, Error)]
/// Errors surfaced by cache internals.
///
/// These never fail a query: the multi-stage cache swallows them into a miss
/// and records the degradation for the response flags.
pub enum CacheError {
    /// The injected retrieval probe failed during semantic validation.
    #[error("semantic validation probe failed: {message}")]
    ProbeFailed {
        /// Error message.
        message: String,
    },

    /// An entry was rejected on insert.
    #[error("cache entry rejected: {message}")]
    EntryRejected {
        /// Error message.
        message: String,
    },
}
