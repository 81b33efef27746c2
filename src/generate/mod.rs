//! Grounded answer generation: prompting, streaming, confidence.

pub mod confidence;
pub mod generator;
pub mod prompt;
pub mod types;

pub use confidence::{combine_confidence, post_answer_confidence, pre_answer_confidence};
pub use generator::{AnswerGenerator, GeneratorConfig};
pub use prompt::build_answer_prompt;
pub use types::{Answer, GenerationEvent, SourceCitation};

/// Fixed reply when retrieval produced nothing to ground an answer on.
pub const NO_INFORMATION_TEXT: &str =
    "No relevant information was found in the indexed documents for this question.";

/// Fixed reply when the model could not be reached after retries.
pub const GENERATION_FAILED_TEXT: &str =
    "Answer generation failed. The sources below were retrieved for this question; \
     please retry.";
