/// A prompted completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    /// Zero means deterministic within a model version.
    pub temperature: f32,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    /// Deterministic request with the given prompt.
    pub fn deterministic(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature: 0.0,
            stop: Vec::new(),
        }
    }

    /// Adds stop sequences.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// One streamed token fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChunk {
    pub text: String,
}

impl TokenChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
