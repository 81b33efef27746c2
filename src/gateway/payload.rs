//! Wire DTOs for the query API.

use serde::{Deserialize, Serialize};

use crate::classify::QueryExplanation;
use crate::generate::SourceCitation;
use crate::pipeline::{QueryMode, QueryOptions, QueryOutcome, StageTimings};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub mode: QueryMode,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_true")]
    pub use_conversation: bool,
}

fn default_true() -> bool {
    true
}

impl QueryRequest {
    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            mode: self.mode,
            use_conversation: self.use_conversation,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query_id: String,
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub confidence: f32,
    pub query_type: &'static str,
    pub strategy_used: &'static str,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
    pub timings_ms: StageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<QueryExplanation>,
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            query_id: outcome.query_id,
            answer: outcome.answer.text,
            sources: outcome.answer.sources,
            confidence: outcome.answer.confidence,
            query_type: outcome.query_type.as_str(),
            strategy_used: outcome.strategy_used.as_str(),
            cache_hit: outcome.cache_hit,
            cache_stage: outcome.cache_stage.map(|s| s.as_str()),
            degraded: outcome.degraded,
            timings_ms: outcome.timings,
            explanation: outcome.explanation,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub query_id: String,
    pub helpful: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub recorded: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearConversationResponse {
    pub cleared: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"query": "What are the rules?"}"#).unwrap();

        assert_eq!(request.mode, QueryMode::Adaptive);
        assert!(!request.stream);
        assert!(request.use_conversation);
    }

    #[test]
    fn test_request_explicit_fields() {
        let request: QueryRequest = serde_json::from_str(
            r#"{"query": "q", "mode": "simple", "stream": true, "use_conversation": false}"#,
        )
        .unwrap();

        assert_eq!(request.mode, QueryMode::Simple);
        assert!(request.stream);
        assert!(!request.use_conversation);
    }
}
