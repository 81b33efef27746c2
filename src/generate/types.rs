use serde::Serialize;

/// A citation into the indexed corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub source_file: String,
    pub page: u32,
    pub chunk_id: String,
    pub relevance_score: f32,
}

/// A generated (or replayed) answer with its grounding.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceCitation>,
    /// Combined retrieval-quality and grounding confidence.
    pub confidence: f32,
    pub generation_ms: u64,
    /// True when this is the fixed generation-failure reply.
    pub failed: bool,
}

/// One event on a generation stream: many tokens, then exactly one `Done`
/// (unless the stream is cancelled first).
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    Token(String),
    Done(Answer),
}
