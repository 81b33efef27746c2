//! Two-stage reranking: cross-encoder, then neural or LLM scoring.

pub mod cross_encoder;
pub mod error;
pub mod llm_rerank;
pub mod neural;
pub mod two_stage;

pub use cross_encoder::{CrossEncoder, HttpCrossEncoder};
pub use error::RerankError;
pub use llm_rerank::score_with_llm;
pub use neural::{HttpNeuralReranker, NeuralReranker};
pub use two_stage::{TwoStageConfig, TwoStageReranker};

#[cfg(any(test, feature = "mock"))]
pub use cross_encoder::MockCrossEncoder;
#[cfg(any(test, feature = "mock"))]
pub use neural::MockNeuralReranker;

/// Min-max normalizes scores into [0, 1] in place.
///
/// A constant slice maps to all-ones: the candidates are indistinguishable,
/// not worthless.
pub fn min_max_normalize(scores: &mut [f32]) {
    let Some(min) = scores.iter().copied().reduce(f32::min) else {
        return;
    };
    let max = scores.iter().copied().fold(min, f32::max);
    let range = max - min;

    for score in scores.iter_mut() {
        *score = if range > 0.0 {
            (*score - min) / range
        } else {
            1.0
        };
    }
}
