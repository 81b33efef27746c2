//! Sliding-window conversation memory with cumulative summarization.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::followup::detect_followup;
use super::types::{ConversationContext, ConversationExchange, ConversationStats};
use crate::llm::{CompletionRequest, LlmClient};
use crate::retrieval::RetrievedDocument;

const SUMMARY_MAX_WORDS: usize = 200;
/// Exchanges echoed verbatim into an enhanced query.
const PREVIEW_EXCHANGES: usize = 3;
/// Answer preview length inside an enhanced query.
const PREVIEW_ANSWER_CHARS: usize = 300;

#[derive(Debug, Clone, Copy)]
pub struct ConversationConfig {
    /// Sliding-window capacity (exchanges).
    pub window: usize,
    /// Summarization cadence (every K additions).
    pub summarize_every: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            window: 10,
            summarize_every: 5,
        }
    }
}

struct MemoryState {
    window: VecDeque<ConversationExchange>,
    /// Cumulative prose summary of everything displaced from the window.
    summary: Option<String>,
    /// Displaced exchanges awaiting the next summarization pass.
    pending_summary: Vec<ConversationExchange>,
    additions: usize,
}

/// Per-session conversation memory.
///
/// Window mutations are serialized behind one lock; summarization runs a
/// dedicated deterministic LLM call and tolerates failure by carrying the
/// displaced exchanges to the next pass.
pub struct ConversationMemory {
    state: RwLock<MemoryState>,
    llm: Arc<dyn LlmClient>,
    config: ConversationConfig,
    summarizations: AtomicU64,
}

impl ConversationMemory {
    pub fn new(llm: Arc<dyn LlmClient>, config: ConversationConfig) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                window: VecDeque::new(),
                summary: None,
                pending_summary: Vec::new(),
                additions: 0,
            }),
            llm,
            config,
            summarizations: AtomicU64::new(0),
        }
    }

    /// Returns `true` when `query` reads as a follow-up to this session.
    pub fn is_followup(&self, query: &str) -> bool {
        let window_nonempty = !self.state.read().window.is_empty();
        detect_followup(query, window_nonempty)
    }

    /// Builds the retrieval context for `query`.
    ///
    /// The original query text is never modified; a follow-up gets a
    /// separate retrieval query of `summary + recent preview + original`.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub fn enhance(&self, query: &str) -> ConversationContext {
        let state = self.state.read();

        if !detect_followup(query, !state.window.is_empty()) {
            return ConversationContext::default();
        }

        let mut parts = Vec::new();
        if let Some(ref summary) = state.summary {
            parts.push(summary.clone());
        }

        for exchange in state.window.iter().rev().take(PREVIEW_EXCHANGES).rev() {
            let answer_preview: String = exchange
                .answer
                .chars()
                .take(PREVIEW_ANSWER_CHARS)
                .collect();
            parts.push(format!("Q: {}\nA: {}", exchange.query, answer_preview));
        }

        parts.push(query.to_string());

        let mut prior_documents = Vec::new();
        for exchange in state.window.iter().rev().take(PREVIEW_EXCHANGES) {
            for chunk in &exchange.retrieved_chunks {
                if prior_documents
                    .iter()
                    .any(|d: &RetrievedDocument| d.meta.chunk_id == chunk.chunk_id)
                {
                    continue;
                }
                prior_documents.push(RetrievedDocument::from_dense(chunk.clone(), 0.0));
            }
        }

        debug!(
            prior_documents = prior_documents.len(),
            "follow-up context built"
        );

        ConversationContext {
            is_followup: true,
            retrieval_query: Some(parts.join("\n")),
            prior_documents,
        }
    }

    /// Records a completed exchange; only successful queries land here.
    ///
    /// Every `summarize_every` additions, displaced exchanges are folded
    /// into the cumulative summary with one deterministic LLM call.
    #[instrument(skip_all)]
    pub async fn record(&self, exchange: ConversationExchange) {
        let due = {
            let mut state = self.state.write();
            state.window.push_back(exchange);
            state.additions += 1;

            while state.window.len() > self.config.window {
                if let Some(displaced) = state.window.pop_front() {
                    state.pending_summary.push(displaced);
                }
            }

            state.additions % self.config.summarize_every == 0
                && !state.pending_summary.is_empty()
        };

        if due {
            self.summarize().await;
        }
    }

    async fn summarize(&self) {
        let (existing_summary, displaced) = {
            let mut state = self.state.write();
            (
                state.summary.clone(),
                std::mem::take(&mut state.pending_summary),
            )
        };

        if displaced.is_empty() {
            return;
        }

        let prompt = build_summary_prompt(existing_summary.as_deref(), &displaced);
        let request = CompletionRequest::deterministic(prompt, 400);

        match self.llm.complete(request).await {
            Ok(summary) => {
                let summary = clamp_words(&summary, SUMMARY_MAX_WORDS);
                info!(words = summary.split_whitespace().count(), "conversation summarized");
                self.state.write().summary = Some(summary);
                self.summarizations.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                // Put the displaced exchanges back; the next pass retries.
                warn!(error = %e, "summarization failed, deferring");
                let mut state = self.state.write();
                let mut restored = displaced;
                restored.extend(std::mem::take(&mut state.pending_summary));
                state.pending_summary = restored;
            }
        }
    }

    pub fn stats(&self) -> ConversationStats {
        let state = self.state.read();
        let approx_bytes: usize = state
            .window
            .iter()
            .map(|e| {
                e.query.len()
                    + e.answer.len()
                    + e.retrieved_chunks.iter().map(|c| c.text.len()).sum::<usize>()
            })
            .sum::<usize>()
            + state.summary.as_ref().map(|s| s.len()).unwrap_or(0);

        ConversationStats {
            exchanges: state.window.len(),
            summarizations: self.summarizations.load(Ordering::Relaxed),
            approx_bytes,
        }
    }

    /// Current cumulative summary, if any.
    pub fn summary(&self) -> Option<String> {
        self.state.read().summary.clone()
    }

    pub fn window_len(&self) -> usize {
        self.state.read().window.len()
    }

    /// Discards the whole session: window, summary, pending work.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.window.clear();
        state.summary = None;
        state.pending_summary.clear();
        state.additions = 0;
    }
}

fn build_summary_prompt(existing: Option<&str>, displaced: &[ConversationExchange]) -> String {
    let mut prompt = String::from(
        "Compress the following conversation into a single summary of at \
         most 200 words. Keep concrete topics, policies, and decisions; drop \
         pleasantries.\n",
    );

    if let Some(existing) = existing {
        prompt.push_str(&format!("\nSummary so far:\n{existing}\n"));
    }

    prompt.push_str("\nNew exchanges:\n");
    for exchange in displaced {
        let answer_preview: String = exchange.answer.chars().take(500).collect();
        prompt.push_str(&format!("Q: {}\nA: {}\n", exchange.query, answer_preview));
    }

    prompt
}

fn clamp_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        text.trim().to_string()
    } else {
        words[..max_words].join(" ")
    }
}

impl std::fmt::Debug for ConversationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationMemory")
            .field("window_len", &self.window_len())
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Clone)]
/// Shared handle to one session's [`ConversationMemory`].
pub struct ConversationMemoryHandle {
    inner: Arc<ConversationMemory>,
}

impl ConversationMemoryHandle {
    pub fn new(memory: ConversationMemory) -> Self {
        Self {
            inner: Arc::new(memory),
        }
    }

    pub fn is_followup(&self, query: &str) -> bool {
        self.inner.is_followup(query)
    }

    pub fn enhance(&self, query: &str) -> ConversationContext {
        self.inner.enhance(query)
    }

    pub async fn record(&self, exchange: ConversationExchange) {
        self.inner.record(exchange).await;
    }

    pub fn stats(&self) -> ConversationStats {
        self.inner.stats()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl std::fmt::Debug for ConversationMemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}
