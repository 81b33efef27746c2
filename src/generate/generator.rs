//! Answer generator: grounded prompting over an LLM, streaming first.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::confidence::{combine_confidence, post_answer_confidence, pre_answer_confidence};
use super::prompt::build_answer_prompt;
use super::types::{Answer, GenerationEvent, SourceCitation};
use super::{GENERATION_FAILED_TEXT, NO_INFORMATION_TEXT};
use crate::llm::{CompletionRequest, LlmClient};
use crate::retrieval::RetrievedDocument;

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { max_tokens: 1024 }
    }
}

/// Generates answers grounded in retrieved documents.
///
/// Retry and timeout behavior comes from the wrapped LLM client; after its
/// ladder is exhausted the generator returns the fixed failure answer with
/// sources intact rather than erroring the query.
pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
    config: GeneratorConfig,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    fn sources_from(documents: &[RetrievedDocument]) -> Vec<SourceCitation> {
        documents
            .iter()
            .map(|d| SourceCitation {
                source_file: d.meta.source_file.clone(),
                page: d.meta.page,
                chunk_id: d.meta.chunk_id.clone(),
                relevance_score: d.final_score,
            })
            .collect()
    }

    fn no_information_answer() -> Answer {
        Answer {
            text: NO_INFORMATION_TEXT.to_string(),
            sources: Vec::new(),
            confidence: 0.0,
            generation_ms: 0,
            failed: false,
        }
    }

    fn failure_answer(documents: &[RetrievedDocument], generation_ms: u64) -> Answer {
        Answer {
            text: GENERATION_FAILED_TEXT.to_string(),
            sources: Self::sources_from(documents),
            confidence: 0.0,
            generation_ms,
            failed: true,
        }
    }

    /// Non-streaming generation.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn generate(&self, query: &str, documents: &[RetrievedDocument]) -> Answer {
        if documents.is_empty() {
            debug!("empty document set, returning fixed answer without llm call");
            return Self::no_information_answer();
        }

        let started = Instant::now();
        let pre = pre_answer_confidence(documents);
        let prompt = build_answer_prompt(query, documents);
        let request = CompletionRequest::deterministic(prompt, self.config.max_tokens);

        match self.llm.complete(request).await {
            Ok(text) => {
                let generation_ms = started.elapsed().as_millis() as u64;
                let post = post_answer_confidence(&text, documents);
                let confidence = combine_confidence(pre, post);

                info!(generation_ms, confidence, "answer generated");
                Answer {
                    text,
                    sources: Self::sources_from(documents),
                    confidence,
                    generation_ms,
                    failed: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "generation failed after retries");
                Self::failure_answer(documents, started.elapsed().as_millis() as u64)
            }
        }
    }

    /// Streaming generation.
    ///
    /// Emits tokens in generation order, then one `Done` carrying sources
    /// and confidence. Cancellation drops the upstream call mid-flight and
    /// ends the stream without a `Done`; already-emitted tokens stand.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn generate_stream(
        &self,
        query: String,
        documents: Vec<RetrievedDocument>,
        cancel: CancellationToken,
    ) -> ReceiverStream<GenerationEvent> {
        let (tx, rx) = mpsc::channel(64);
        let llm = self.llm.clone();
        let max_tokens = self.config.max_tokens;

        tokio::spawn(async move {
            if documents.is_empty() {
                let _ = tx
                    .send(GenerationEvent::Done(Self::no_information_answer()))
                    .await;
                return;
            }

            let started = Instant::now();
            // Retrieval-quality confidence is ready before the first token.
            let pre = pre_answer_confidence(&documents);
            let prompt = build_answer_prompt(&query, &documents);
            let request = CompletionRequest::deterministic(prompt, max_tokens);

            let mut token_stream = match llm.stream(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "stream start failed after retries");
                    let _ = tx
                        .send(GenerationEvent::Done(Self::failure_answer(
                            &documents,
                            started.elapsed().as_millis() as u64,
                        )))
                        .await;
                    return;
                }
            };

            let mut accumulated = String::new();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        // Dropping the stream aborts the upstream call.
                        debug!("generation cancelled mid-stream");
                        return;
                    }
                    next = token_stream.next() => match next {
                        Some(Ok(chunk)) => {
                            accumulated.push_str(&chunk.text);
                            if tx.send(GenerationEvent::Token(chunk.text)).await.is_err() {
                                // Receiver went away; treat as cancellation.
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "stream failed mid-generation");
                            let _ = tx
                                .send(GenerationEvent::Done(Self::failure_answer(
                                    &documents,
                                    started.elapsed().as_millis() as u64,
                                )))
                                .await;
                            return;
                        }
                        None => break,
                    }
                }
            }

            let generation_ms = started.elapsed().as_millis() as u64;
            let post = post_answer_confidence(&accumulated, &documents);
            let confidence = combine_confidence(pre, post);

            info!(generation_ms, confidence, "streamed answer complete");
            let _ = tx
                .send(GenerationEvent::Done(Answer {
                    text: accumulated,
                    sources: Self::sources_from(&documents),
                    confidence,
                    generation_ms,
                    failed: false,
                }))
                .await;
        });

        ReceiverStream::new(rx)
    }
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator")
            .field("model", &self.llm.model_name())
            .field("config", &self.config)
            .finish()
    }
}
