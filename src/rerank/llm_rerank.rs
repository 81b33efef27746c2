//! Batched LLM relevance scoring, the second-stage fallback.
//!
//! All documents go into one prompt and one completion call; N separate
//! calls would multiply latency by N for no accuracy gain.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::error::RerankError;
use crate::llm::{CompletionRequest, LlmClient};

const SCORE_MIN: f32 = 1.0;
const SCORE_MAX: f32 = 10.0;
/// Unparseable or missing lines score mid-scale rather than sinking the doc.
const SCORE_DEFAULT: f32 = 5.5;

fn build_prompt(query: &str, documents: &[String]) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(
        "Rate each document's relevance to the query on a 1-10 scale. \
         Reply with exactly one line per document, formatted as \
         `<document number>: <score>`, and nothing else.\n\n",
    );
    prompt.push_str(&format!("Query: {query}\n"));

    for (i, document) in documents.iter().enumerate() {
        prompt.push_str(&format!("\nDocument {}:\n{}\n", i + 1, document));
    }

    prompt
}

fn parse_scores(raw: &str, count: usize) -> Vec<f32> {
    let mut scores = vec![SCORE_DEFAULT; count];

    for line in raw.lines() {
        let line = line.trim();
        let Some((index_part, score_part)) = line.split_once(':') else {
            continue;
        };

        let index: usize = match index_part
            .trim()
            .trim_start_matches("Document")
            .trim_start_matches("document")
            .trim()
            .parse()
        {
            Ok(i) => i,
            Err(_) => continue,
        };

        let score: f32 = match score_part.trim().parse() {
            Ok(s) => s,
            Err(_) => continue,
        };

        if index >= 1 && index <= count {
            scores[index - 1] = score.clamp(SCORE_MIN, SCORE_MAX);
        }
    }

    scores
}

/// Scores `documents` against `query` with a single batched completion,
/// returning scores normalized to [0, 1].
#[instrument(skip(llm, query, documents), fields(documents = documents.len()))]
pub async fn score_with_llm(
    llm: Arc<dyn LlmClient>,
    query: &str,
    documents: &[String],
) -> Result<Vec<f32>, RerankError> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = build_prompt(query, documents);
    let request = CompletionRequest::deterministic(prompt, 16 * documents.len() as u32 + 32);

    let raw = llm
        .complete(request)
        .await
        .map_err(|e| RerankError::LlmFailed {
            message: e.to_string(),
        })?;

    let scores = parse_scores(&raw, documents.len());
    let parsed = scores.iter().filter(|s| **s != SCORE_DEFAULT).count();
    if parsed < documents.len() {
        warn!(
            parsed,
            expected = documents.len(),
            "llm rerank returned partial scores; defaults substituted"
        );
    }
    debug!(?scores, "llm rerank raw scores");

    Ok(scores
        .into_iter()
        .map(|s| (s - SCORE_MIN) / (SCORE_MAX - SCORE_MIN))
        .collect())
}
