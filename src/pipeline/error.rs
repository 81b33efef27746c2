use thiserror::Error;

use crate::retrieval::RetrievalError;

#[derive(Debug, Error)]
/// Errors that fail a query outright.
///
/// Degraded collaborators (sparse index, rerankers, cache) never appear
/// here; they ride along in the response's `degraded` list.
pub enum PipelineError {
    /// Empty, overlong, or malformed query.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },

    /// Admission control refused the query.
    #[error("too many concurrent queries")]
    RateLimited {
        /// Suggested client backoff.
        retry_after_ms: u64,
    },

    /// A load-bearing dependency (dense store, embedder) is down.
    #[error("dependency unavailable: {message}")]
    DependencyUnavailable {
        /// What failed.
        message: String,
    },

    /// The overall per-query deadline was exceeded.
    #[error("query deadline exceeded after {deadline_ms}ms")]
    DeadlineExceeded {
        /// Configured deadline.
        deadline_ms: u64,
    },

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Opaque description.
        message: String,
    },
}

impl PipelineError {
    /// Wire error kind for the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput { .. } => "invalid_input",
            PipelineError::RateLimited { .. } => "rate_limited",
            PipelineError::DependencyUnavailable { .. } => "dependency_unavailable",
            PipelineError::DeadlineExceeded { .. } => "timeout_global",
            PipelineError::Internal { .. } => "internal",
        }
    }
}

impl From<RetrievalError> for PipelineError {
    fn from(error: RetrievalError) -> Self {
        PipelineError::DependencyUnavailable {
            message: error.to_string(),
        }
    }
}
