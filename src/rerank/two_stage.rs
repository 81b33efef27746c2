//! Two-stage rerank orchestration.
//!
//! Stage 1 scores every candidate with the cross-encoder in GPU-sized
//! batches. Stage 2 rescoring runs over only the leading candidates, through
//! the neural reranker when configured and the batched-LLM scorer otherwise.
//! Final scores fuse both stages: `final = alpha * ce + (1 - alpha) * rr`.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::cross_encoder::CrossEncoder;
use super::llm_rerank::score_with_llm;
use super::min_max_normalize;
use super::neural::NeuralReranker;
use crate::constants::DOC_TRUNCATE_CHARS;
use crate::llm::LlmClient;
use crate::retrieval::types::{RetrievedDocument, sort_by_final_score};

#[derive(Debug, Clone, Copy)]
pub struct TwoStageConfig {
    /// Weight of the cross-encoder score in fusion.
    pub alpha: f32,
    /// Cross-encoder batch size.
    pub batch_size: usize,
    /// Candidates forwarded to stage 2.
    pub stage2_top: usize,
}

impl Default for TwoStageConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            batch_size: 32,
            stage2_top: 8,
        }
    }
}

/// Truncates to a maximum number of chars without splitting a code point.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

pub struct TwoStageReranker {
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    neural: Option<Arc<dyn NeuralReranker>>,
    llm: Arc<dyn LlmClient>,
    config: TwoStageConfig,
}

impl TwoStageReranker {
    pub fn new(
        cross_encoder: Option<Arc<dyn CrossEncoder>>,
        neural: Option<Arc<dyn NeuralReranker>>,
        llm: Arc<dyn LlmClient>,
        config: TwoStageConfig,
    ) -> Self {
        Self {
            cross_encoder,
            neural,
            llm,
            config,
        }
    }

    /// Reranks `documents` and returns the top `top_n` with the names of any
    /// collaborators that failed along the way.
    #[instrument(skip(self, query, documents), fields(candidates = documents.len()))]
    pub async fn rerank(
        &self,
        query: &str,
        mut documents: Vec<RetrievedDocument>,
        top_n: usize,
    ) -> (Vec<RetrievedDocument>, Vec<String>) {
        let mut degraded = Vec::new();

        if documents.is_empty() {
            return (documents, degraded);
        }

        let texts: Vec<String> = documents
            .iter()
            .map(|d| truncate_chars(&d.meta.text, DOC_TRUNCATE_CHARS).to_string())
            .collect();

        // Stage 1: cross-encoder over all candidates, batched.
        let ce_scores = match &self.cross_encoder {
            Some(encoder) => match self.score_batched(encoder.as_ref(), query, &texts).await {
                Ok(mut scores) => {
                    min_max_normalize(&mut scores);
                    Some(scores)
                }
                Err(e) => {
                    warn!(error = %e, "cross-encoder unavailable, skipping stage 1");
                    degraded.push("cross_encoder".to_string());
                    None
                }
            },
            None => None,
        };

        if let Some(ref scores) = ce_scores {
            for (doc, score) in documents.iter_mut().zip(scores.iter()) {
                doc.cross_encoder_score = Some(*score);
            }
        }

        // Candidate order for stage 2: cross-encoder score when we have it,
        // fused score otherwise.
        let mut order: Vec<usize> = (0..documents.len()).collect();
        order.sort_by(|&a, &b| {
            let score = |i: usize| {
                documents[i]
                    .cross_encoder_score
                    .unwrap_or(documents[i].final_score)
            };
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| documents[a].meta.chunk_id.cmp(&documents[b].meta.chunk_id))
        });
        let stage2_indices: Vec<usize> =
            order.iter().copied().take(self.config.stage2_top).collect();
        let stage2_texts: Vec<String> = stage2_indices
            .iter()
            .map(|&i| texts[i].clone())
            .collect();

        // Stage 2: neural reranker preferred, batched LLM fallback.
        let rr_scores = self
            .stage2_scores(query, &stage2_texts, &mut degraded)
            .await;

        if let Some(scores) = rr_scores {
            for (&index, score) in stage2_indices.iter().zip(scores.iter()) {
                documents[index].rerank_score = Some(*score);
            }
        }

        let alpha = self.config.alpha;
        for doc in documents.iter_mut() {
            doc.final_score = match (doc.cross_encoder_score, doc.rerank_score) {
                (Some(ce), Some(rr)) => alpha * ce + (1.0 - alpha) * rr,
                (Some(ce), None) => alpha * ce,
                (None, Some(rr)) => (1.0 - alpha) * rr,
                // Both stages down: fused retrieval score stands.
                (None, None) => doc.final_score,
            };
        }

        sort_by_final_score(&mut documents);
        documents.truncate(top_n);

        debug!(
            returned = documents.len(),
            degraded = degraded.len(),
            "rerank complete"
        );
        (documents, degraded)
    }

    async fn score_batched(
        &self,
        encoder: &dyn CrossEncoder,
        query: &str,
        texts: &[String],
    ) -> Result<Vec<f32>, crate::rerank::RerankError> {
        let mut scores = Vec::with_capacity(texts.len());
        // Batches run sequentially: the scoring device handles one batch at
        // a time.
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            let batch_scores = encoder.score_pairs(query, batch).await?;
            scores.extend(batch_scores);
        }
        Ok(scores)
    }

    async fn stage2_scores(
        &self,
        query: &str,
        texts: &[String],
        degraded: &mut Vec<String>,
    ) -> Option<Vec<f32>> {
        if texts.is_empty() {
            return None;
        }

        if let Some(neural) = &self.neural {
            match neural.rerank(query, texts).await {
                Ok(mut scores) => {
                    min_max_normalize(&mut scores);
                    return Some(scores);
                }
                Err(e) => {
                    warn!(error = %e, "neural reranker unavailable, falling back to llm");
                    degraded.push("neural_reranker".to_string());
                }
            }
        }

        match score_with_llm(self.llm.clone(), query, texts).await {
            Ok(scores) => Some(scores),
            Err(e) => {
                warn!(error = %e, "llm rerank failed, keeping prior scores");
                degraded.push("reranker".to_string());
                None
            }
        }
    }
}

impl std::fmt::Debug for TwoStageReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoStageReranker")
            .field("has_cross_encoder", &self.cross_encoder.is_some())
            .field("has_neural", &self.neural.is_some())
            .field("config", &self.config)
            .finish()
    }
}
