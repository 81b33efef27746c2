//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.
//!
//! The embedding dimension is a runtime-configurable value with a BGE-M3
//! default; modules that need to agree on it take it from [`crate::config::Config`]
//! and validate at their boundary with [`validate_embedding_dim`].

/// Default embedding dimension (BGE-M3).
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

/// Maximum characters of a document passed to rerankers and prompts.
///
/// Roughly 800 tokens. The opening section of a policy chunk carries most of
/// its signal, so truncation here trades little recall for a large latency win.
pub const DOC_TRUNCATE_CHARS: usize = 3200;

/// RRF rank constant. Standard value from the original RRF paper.
pub const RRF_K: f32 = 60.0;

/// Maximum accepted query length in characters.
pub const MAX_QUERY_CHARS: usize = 10_000;

/// Error raised when an embedding has an unexpected dimension.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DimValidationError {
    /// Dimension was zero.
    #[error("embedding dimension must be non-zero")]
    ZeroDimension,

    /// A vector did not match the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// Configured dimension.
        expected: usize,
        /// Observed dimension.
        actual: usize,
    },
}

/// Validates that `vector` has exactly `expected` components.
#[inline]
pub fn validate_embedding_dim(vector: &[f32], expected: usize) -> Result<(), DimValidationError> {
    if expected == 0 {
        return Err(DimValidationError::ZeroDimension);
    }
    if vector.len() != expected {
        return Err(DimValidationError::Mismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_embedding_dim_accepts_match() {
        let v = vec![0.0f32; 1024];
        assert!(validate_embedding_dim(&v, 1024).is_ok());
    }

    #[test]
    fn test_validate_embedding_dim_rejects_mismatch() {
        let v = vec![0.0f32; 768];
        assert_eq!(
            validate_embedding_dim(&v, 1024),
            Err(DimValidationError::Mismatch {
                expected: 1024,
                actual: 768,
            })
        );
    }

    #[test]
    fn test_validate_embedding_dim_rejects_zero() {
        let v: Vec<f32> = vec![];
        assert_eq!(
            validate_embedding_dim(&v, 0),
            Err(DimValidationError::ZeroDimension)
        );
    }
}
