//! Per-query state machine.
//!
//! ```text
//! RECEIVED → CACHE_LOOKUP(A/B)
//!   hit → DONE
//!   miss → admit → EMBED → [CLASSIFY + FOLLOWUP] → CACHE_LOOKUP(C)
//!     hit → DONE
//!     miss → RETRIEVE → RERANK → GENERATE → CONFIDENCE → CACHE_PUT → DONE
//! ```
//!
//! Exact/normalized lookups run before admission, so cache hits never
//! consume a pipeline slot. The whole miss path runs under one deadline;
//! hitting it drops the in-flight work, which aborts any LLM call and skips
//! the cache put and the conversation insert.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::time::{Instant, sleep, timeout};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheHit, CachedAnswer, CacheStats, MultiStageCacheHandle};
use crate::classify::{QueryExplanation, QueryType, classify};
use crate::constants::MAX_QUERY_CHARS;
use crate::conversation::{ConversationExchange, ConversationMemoryHandle};
use crate::embedding::EmbeddingClient;
use crate::generate::{Answer, AnswerGenerator, GenerationEvent};
use crate::retrieval::{RetrievalEngine, RetrievalResult, Strategy};

use super::error::PipelineError;
use super::types::{
    PipelineCounters, PipelineEvent, PipelineStats, QueryMode, QueryOptions, QueryOutcome,
    StageTimings,
};

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Overall per-query deadline.
    pub deadline: Duration,
    /// Concurrent full pipelines admitted (cache hits excluded).
    pub max_concurrent: usize,
    /// Backoff hint returned with rate-limit rejections.
    pub retry_after_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(120),
            max_concurrent: 10,
            retry_after_ms: 1_000,
        }
    }
}

/// Everything the miss path produced before generation.
struct PreparedRun {
    retrieval: RetrievalResult,
    /// Embedding of the original (cache-key) query.
    embedding: Vec<f32>,
    timings: StageTimings,
    degraded: Vec<String>,
}

enum Prepared {
    Hit(Box<QueryOutcome>),
    Run(Box<PreparedRun>),
}

/// The end-to-end query pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    cache: MultiStageCacheHandle,
    embedder: Arc<dyn EmbeddingClient>,
    engine: Arc<RetrievalEngine>,
    generator: Arc<AnswerGenerator>,
    memory: ConversationMemoryHandle,
    admission: Arc<Semaphore>,
    counters: Arc<PipelineCounters>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        cache: MultiStageCacheHandle,
        embedder: Arc<dyn EmbeddingClient>,
        engine: Arc<RetrievalEngine>,
        generator: Arc<AnswerGenerator>,
        memory: ConversationMemoryHandle,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cache,
            embedder,
            engine,
            generator,
            memory,
            admission: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            counters: Arc::new(PipelineCounters::default()),
            config,
        }
    }

    pub fn cache(&self) -> &MultiStageCacheHandle {
        &self.cache
    }

    pub fn memory(&self) -> &ConversationMemoryHandle {
        &self.memory
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn validate(&self, query: &str) -> Result<(), PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::InvalidInput {
                message: "query must not be empty".to_string(),
            });
        }
        let chars = query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(PipelineError::InvalidInput {
                message: format!("query length {chars} exceeds maximum {MAX_QUERY_CHARS}"),
            });
        }
        Ok(())
    }

    fn classify_for(&self, query: &str, options: QueryOptions) -> (QueryType, QueryExplanation) {
        // Classification always sees the original query; context-enhanced
        // text would inflate the score and misroute follow-ups.
        let (query_type, explanation) = classify(query);
        match options.mode {
            QueryMode::Simple => (QueryType::Simple, explanation),
            QueryMode::Adaptive => (query_type, explanation),
        }
    }

    fn outcome_from_hit(
        &self,
        query: &str,
        options: QueryOptions,
        hit: CacheHit,
        started: Instant,
        timings: StageTimings,
        degraded: Vec<String>,
    ) -> QueryOutcome {
        let (query_type, explanation) = self.classify_for(query, options);
        let mut timings = timings;
        timings.total = started.elapsed().as_millis() as u64;

        QueryOutcome {
            query_id: uuid::Uuid::new_v4().to_string(),
            answer: Answer {
                text: hit.answer.answer.clone(),
                sources: hit.answer.sources.clone(),
                confidence: hit.answer.confidence,
                generation_ms: 0,
                failed: false,
            },
            query_type,
            strategy_used: Strategy::for_query_type(query_type),
            cache_hit: true,
            cache_stage: Some(hit.stage),
            timings,
            explanation: Some(explanation),
            degraded,
        }
    }

    /// Runs every stage up to (not including) generation.
    async fn prepare(
        &self,
        query: &str,
        options: QueryOptions,
        started: Instant,
        cache_lookup_ms: u64,
    ) -> Result<Prepared, PipelineError> {
        let mut timings = StageTimings {
            cache_lookup: cache_lookup_ms,
            ..StageTimings::default()
        };
        let mut degraded = Vec::new();

        let context = if options.use_conversation {
            self.memory.enhance(query)
        } else {
            Default::default()
        };
        let (query_type, explanation) = self.classify_for(query, options);

        let embed_started = Instant::now();
        let embedding =
            self.embedder
                .embed(query)
                .await
                .map_err(|e| PipelineError::DependencyUnavailable {
                    message: format!("embedding backend: {e}"),
                })?;
        timings.embedding = embed_started.elapsed().as_millis() as u64;

        let semantic_started = Instant::now();
        let semantic = self.cache.lookup_semantic(&embedding).await;
        timings.cache_lookup += semantic_started.elapsed().as_millis() as u64;

        if semantic.probe_failed {
            degraded.push("cache_error".to_string());
        }
        if let Some(hit) = semantic.hit {
            return Ok(Prepared::Hit(Box::new(self.outcome_from_hit(
                query, options, hit, started, timings, degraded,
            ))));
        }
        self.cache.record_miss();

        // Retrieval sees the context-enhanced query for follow-ups; the
        // original text and embedding stay bound to the cache.
        let (retrieval_query, retrieval_embedding) = match context.retrieval_query {
            Some(enhanced) => {
                let embed_started = Instant::now();
                let enhanced_embedding = self.embedder.embed(&enhanced).await.map_err(|e| {
                    PipelineError::DependencyUnavailable {
                        message: format!("embedding backend: {e}"),
                    }
                })?;
                timings.embedding += embed_started.elapsed().as_millis() as u64;
                (enhanced, enhanced_embedding)
            }
            None => (query.to_string(), embedding.clone()),
        };

        let retrieve_started = Instant::now();
        let retrieval = self
            .engine
            .retrieve(
                &retrieval_query,
                &retrieval_embedding,
                query_type,
                explanation,
                context.prior_documents,
            )
            .await?;
        let retrieve_ms = retrieve_started.elapsed().as_millis() as u64;
        timings.rerank = retrieval.timings.rerank_ms;
        timings.retrieval = retrieve_ms.saturating_sub(timings.rerank);

        for name in &retrieval.degraded {
            if !degraded.contains(name) {
                degraded.push(name.clone());
            }
        }

        Ok(Prepared::Run(Box::new(PreparedRun {
            retrieval,
            embedding,
            timings,
            degraded,
        })))
    }

    /// Post-generation bookkeeping: cache put, conversation insert, outcome.
    async fn finalize(
        &self,
        query: &str,
        options: QueryOptions,
        run: PreparedRun,
        answer: Answer,
        started: Instant,
    ) -> QueryOutcome {
        let PreparedRun {
            retrieval,
            embedding,
            mut timings,
            degraded,
        } = run;

        timings.generation = answer.generation_ms;

        if answer.failed {
            self.counters
                .generation_failures
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }

        // Failed or ungrounded answers are not worth replaying.
        if !answer.failed && !retrieval.documents.is_empty() {
            let chunk_ids: HashSet<String> = retrieval
                .documents
                .iter()
                .map(|d| d.meta.chunk_id.clone())
                .collect();
            self.cache.put(
                query,
                embedding,
                chunk_ids,
                CachedAnswer {
                    answer: answer.text.clone(),
                    sources: answer.sources.clone(),
                    confidence: answer.confidence,
                },
            );
        }

        if options.use_conversation && !answer.failed {
            self.memory
                .record(ConversationExchange {
                    query: query.to_string(),
                    answer: answer.text.clone(),
                    retrieved_chunks: retrieval.documents.iter().map(|d| d.meta.clone()).collect(),
                    query_type: retrieval.query_type,
                    strategy: retrieval.strategy_used,
                    timestamp: chrono::Utc::now(),
                })
                .await;
        }

        self.counters.record_strategy(retrieval.strategy_used);
        timings.total = started.elapsed().as_millis() as u64;
        self.counters
            .total_latency_ms
            .fetch_add(timings.total, std::sync::atomic::Ordering::Relaxed);

        info!(
            strategy = retrieval.strategy_used.as_str(),
            total_ms = timings.total,
            confidence = answer.confidence,
            "query complete"
        );

        QueryOutcome {
            query_id: uuid::Uuid::new_v4().to_string(),
            answer,
            query_type: retrieval.query_type,
            strategy_used: retrieval.strategy_used,
            cache_hit: false,
            cache_stage: None,
            timings,
            explanation: Some(retrieval.explanation.clone()),
            degraded,
        }
    }

    /// Non-streaming query execution.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn execute(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<QueryOutcome, PipelineError> {
        self.validate(query)?;
        self.counters
            .queries
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let started = Instant::now();
        let cache_started = Instant::now();
        if let Some(hit) = self.cache.lookup_fast(query) {
            let timings = StageTimings {
                cache_lookup: cache_started.elapsed().as_millis() as u64,
                ..StageTimings::default()
            };
            return Ok(self.outcome_from_hit(query, options, hit, started, timings, Vec::new()));
        }
        let cache_lookup_ms = cache_started.elapsed().as_millis() as u64;

        let _permit = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.counters
                    .rejected
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Err(PipelineError::RateLimited {
                    retry_after_ms: self.config.retry_after_ms,
                });
            }
        };

        let work = async {
            match self
                .prepare(query, options, started, cache_lookup_ms)
                .await?
            {
                Prepared::Hit(outcome) => Ok(*outcome),
                Prepared::Run(run) => {
                    let answer = self
                        .generator
                        .generate(query, &run.retrieval.documents)
                        .await;
                    Ok(self.finalize(query, options, *run, answer, started).await)
                }
            }
        };

        match timeout(self.config.deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                self.counters
                    .timeouts
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                warn!("query hit global deadline");
                Err(PipelineError::DeadlineExceeded {
                    deadline_ms: self.config.deadline.as_millis() as u64,
                })
            }
        }
    }

    /// Streaming query execution.
    ///
    /// Returns quickly with the event stream; the pipeline runs in a task.
    /// Dropping the stream cancels the in-flight query.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn execute_stream(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<ReceiverStream<PipelineEvent>, PipelineError> {
        self.validate(query)?;
        self.counters
            .queries
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let started = Instant::now();
        let cache_started = Instant::now();

        let (tx, rx) = mpsc::channel(64);

        if let Some(hit) = self.cache.lookup_fast(query) {
            let timings = StageTimings {
                cache_lookup: cache_started.elapsed().as_millis() as u64,
                ..StageTimings::default()
            };
            let outcome =
                self.outcome_from_hit(query, options, hit, started, timings, Vec::new());
            // Replay the cached answer as one token, then the done event.
            let _ = tx
                .send(PipelineEvent::Token(outcome.answer.text.clone()))
                .await;
            let _ = tx.send(PipelineEvent::Done(Box::new(outcome))).await;
            return Ok(ReceiverStream::new(rx));
        }
        let cache_lookup_ms = cache_started.elapsed().as_millis() as u64;

        let permit = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.counters
                    .rejected
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Err(PipelineError::RateLimited {
                    retry_after_ms: self.config.retry_after_ms,
                });
            }
        };

        let this = self.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            let _permit = permit;
            this.run_stream(query, options, started, cache_lookup_ms, tx)
                .await;
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn run_stream(
        &self,
        query: String,
        options: QueryOptions,
        started: Instant,
        cache_lookup_ms: u64,
        tx: mpsc::Sender<PipelineEvent>,
    ) {
        let deadline = self.config.deadline;

        let prepared = match timeout(
            deadline,
            self.prepare(&query, options, started, cache_lookup_ms),
        )
        .await
        {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(e)) => {
                let _ = tx.send(PipelineEvent::Failed(e)).await;
                return;
            }
            Err(_) => {
                self.counters
                    .timeouts
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let _ = tx
                    .send(PipelineEvent::Failed(PipelineError::DeadlineExceeded {
                        deadline_ms: deadline.as_millis() as u64,
                    }))
                    .await;
                return;
            }
        };

        let run = match prepared {
            Prepared::Hit(outcome) => {
                let _ = tx
                    .send(PipelineEvent::Token(outcome.answer.text.clone()))
                    .await;
                let _ = tx.send(PipelineEvent::Done(outcome)).await;
                return;
            }
            Prepared::Run(run) => run,
        };

        // Generation streams under a cancellation token armed with whatever
        // deadline budget remains.
        let cancel = CancellationToken::new();
        let remaining = deadline.saturating_sub(started.elapsed());
        let deadline_guard = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sleep(remaining).await;
                cancel.cancel();
            })
        };

        let mut stream = self.generator.generate_stream(
            query.clone(),
            run.retrieval.documents.clone(),
            cancel.clone(),
        );

        let mut run_slot = Some(run);
        let mut finished = false;
        while let Some(event) = stream.next().await {
            match event {
                GenerationEvent::Token(text) => {
                    if tx.send(PipelineEvent::Token(text)).await.is_err() {
                        // Client went away: cancel upstream, no cache put.
                        debug!("stream receiver dropped, cancelling generation");
                        cancel.cancel();
                        deadline_guard.abort();
                        return;
                    }
                }
                GenerationEvent::Done(answer) => {
                    let Some(run) = run_slot.take() else { break };
                    let outcome = self
                        .finalize(&query, options, *run, answer, started)
                        .await;
                    let _ = tx.send(PipelineEvent::Done(Box::new(outcome))).await;
                    finished = true;
                    break;
                }
            }
        }

        deadline_guard.abort();

        if !finished {
            // The token fired mid-generation; partial tokens stand, but the
            // query itself failed.
            self.counters
                .timeouts
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let _ = tx
                .send(PipelineEvent::Failed(PipelineError::DeadlineExceeded {
                    deadline_ms: deadline.as_millis() as u64,
                }))
                .await;
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish()
    }
}
