//! End-to-end pipeline behavior over mock backends.

mod common;

use std::time::Duration;

use common::harness::{HarnessOptions, build};
use futures_util::StreamExt;
use regent::generate::NO_INFORMATION_TEXT;
use regent::pipeline::{PipelineError, PipelineEvent, QueryMode, QueryOptions};

fn no_conversation() -> QueryOptions {
    QueryOptions {
        use_conversation: false,
        ..QueryOptions::default()
    }
}

#[tokio::test]
async fn test_followup_enhances_retrieval_but_not_classification() {
    let harness = build(HarnessOptions::default());
    harness
        .seed("u1", "uniform regulations for daily wear", "uniform.pdf", 3)
        .await;
    harness
        .seed("t1", "tattoo policy and visible ink limits", "tattoo.pdf", 9)
        .await;

    harness.llm.push_response("U1: uniforms must be serviceable.");
    let first = harness
        .orchestrator
        .execute("What are the uniform regulations?", QueryOptions::default())
        .await
        .unwrap();
    assert!(!first.cache_hit);

    harness.llm.push_response("U2: tattoos are regulated; uniform context applies.");
    let second = harness
        .orchestrator
        .execute("What about tattoos?", QueryOptions::default())
        .await
        .unwrap();

    // Three words: the classifier sees the original query, not the
    // context-enhanced one, so the follow-up stays on the simple path.
    assert_eq!(second.query_type.as_str(), "simple");
    assert_eq!(second.strategy_used.as_str(), "simple");
    assert!(second.answer.text.contains("tattoos"));

    let stats = harness.orchestrator.memory().stats();
    assert_eq!(stats.exchanges, 2);
}

#[tokio::test]
async fn test_sparse_outage_degrades_gracefully() {
    let harness = build(HarnessOptions::default());
    harness
        .seed("c1", "grooming standards for beards and hair", "grooming.pdf", 2)
        .await;
    harness.sparse.set_unavailable(true);

    harness.llm.push_response("1: 8");
    harness.llm.push_response("Grooming answer.");

    // "how" + 7 words lands on the hybrid path, which needs the sparse index.
    let outcome = harness
        .orchestrator
        .execute(
            "How should members maintain grooming standards daily?",
            no_conversation(),
        )
        .await
        .unwrap();

    assert!(outcome.degraded.contains(&"sparse_index".to_string()));
    assert!(!outcome.answer.text.is_empty());
}

#[tokio::test]
async fn test_empty_retrieval_returns_fixed_answer_without_llm() {
    let harness = build(HarnessOptions::default());
    // Store intentionally left empty.

    let outcome = harness
        .orchestrator
        .execute("What are the beard grooming standards?", no_conversation())
        .await
        .unwrap();

    assert_eq!(outcome.answer.text, NO_INFORMATION_TEXT);
    assert_eq!(outcome.answer.confidence, 0.0);
    assert!(outcome.answer.sources.is_empty());
    assert_eq!(harness.llm.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_input_bounds() {
    let harness = build(HarnessOptions::default());

    let empty = harness.orchestrator.execute("", no_conversation()).await;
    assert!(matches!(empty, Err(PipelineError::InvalidInput { .. })));

    let overlong = harness
        .orchestrator
        .execute(&"x".repeat(10_001), no_conversation())
        .await;
    assert!(matches!(overlong, Err(PipelineError::InvalidInput { .. })));

    // Exactly at the limit is accepted (store is empty, fixed answer).
    let at_limit = harness
        .orchestrator
        .execute(&"x".repeat(10_000), no_conversation())
        .await;
    assert!(at_limit.is_ok());
}

#[tokio::test]
async fn test_embedding_computed_once_per_query() {
    let harness = build(HarnessOptions::default());
    harness
        .seed("c1", "beard grooming standards", "grooming.pdf", 1)
        .await;

    harness.llm.push_response("answer");
    let query = "What are the beard grooming standards?";
    harness
        .orchestrator
        .execute(query, no_conversation())
        .await
        .unwrap();

    let embeds_of_query = harness
        .embedder
        .embedded_texts()
        .iter()
        .filter(|t| t.as_str() == query)
        .count();
    assert_eq!(embeds_of_query, 1);
}

#[tokio::test]
async fn test_generation_failure_keeps_sources_confidence_zero() {
    let harness = build(HarnessOptions::default());
    harness
        .seed("c1", "beard grooming standards", "grooming.pdf", 1)
        .await;

    harness.llm.fail_next(1);
    let outcome = harness
        .orchestrator
        .execute("What are the beard grooming standards?", no_conversation())
        .await
        .unwrap();

    assert!(outcome.answer.failed);
    assert_eq!(outcome.answer.confidence, 0.0);
    assert!(!outcome.answer.sources.is_empty());

    // Failed answers are not cached.
    harness.llm.push_response("recovered answer");
    let retry = harness
        .orchestrator
        .execute("What are the beard grooming standards?", no_conversation())
        .await
        .unwrap();
    assert!(!retry.cache_hit);
    assert_eq!(retry.answer.text, "recovered answer");
}

#[tokio::test]
async fn test_admission_rejects_when_saturated() {
    let mut options = HarnessOptions::default();
    options.pipeline.max_concurrent = 1;
    let harness = build(options);
    harness
        .seed("c1", "beard grooming standards", "grooming.pdf", 1)
        .await;

    // Hold the only slot with a slow generation.
    harness.llm.set_delay(Duration::from_millis(300));
    harness.llm.push_response("slow answer");
    harness.llm.push_response("second answer");

    let orchestrator = harness.orchestrator.clone();
    let slow = tokio::spawn(async move {
        orchestrator
            .execute("What are the beard grooming standards?", no_conversation())
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let rejected = harness
        .orchestrator
        .execute("What are the uniform regulations?", no_conversation())
        .await;

    assert!(matches!(
        rejected,
        Err(PipelineError::RateLimited { retry_after_ms: _ })
    ));
    assert!(slow.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_cache_hits_bypass_admission() {
    let mut options = HarnessOptions::default();
    options.pipeline.max_concurrent = 1;
    let harness = build(options);
    harness
        .seed("c1", "beard grooming standards", "grooming.pdf", 1)
        .await;

    harness.llm.push_response("cached answer");
    let query = "What are the beard grooming standards?";
    harness
        .orchestrator
        .execute(query, no_conversation())
        .await
        .unwrap();

    // Saturate the pipeline slot.
    harness.llm.set_delay(Duration::from_millis(300));
    harness.llm.push_response("slow answer");
    let orchestrator = harness.orchestrator.clone();
    let slow = tokio::spawn(async move {
        orchestrator
            .execute("What are the uniform regulations?", no_conversation())
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The exact hit still lands while the slot is held.
    let hit = harness
        .orchestrator
        .execute(query, no_conversation())
        .await
        .unwrap();
    assert!(hit.cache_hit);

    let _ = slow.await.unwrap();
}

#[tokio::test]
async fn test_global_deadline() {
    let mut options = HarnessOptions::default();
    options.pipeline.deadline = Duration::from_millis(100);
    let harness = build(options);
    harness
        .seed("c1", "beard grooming standards", "grooming.pdf", 1)
        .await;

    harness.llm.set_delay(Duration::from_millis(500));
    harness.llm.push_response("too late");

    let outcome = harness
        .orchestrator
        .execute("What are the beard grooming standards?", no_conversation())
        .await;

    assert!(matches!(
        outcome,
        Err(PipelineError::DeadlineExceeded { .. })
    ));
    // A timed-out query leaves no cache side effects.
    assert_eq!(harness.orchestrator.cache_stats().puts, 0);
}

#[tokio::test]
async fn test_streaming_order_tokens_then_done() {
    let harness = build(HarnessOptions::default());
    harness
        .seed("c1", "beard grooming standards text", "grooming.pdf", 1)
        .await;
    harness.llm.push_response("alpha beta gamma");

    let mut stream = harness
        .orchestrator
        .execute_stream("What are the beard grooming standards?", no_conversation())
        .await
        .unwrap();

    let mut tokens = String::new();
    let mut done = None;
    while let Some(event) = stream.next().await {
        match event {
            PipelineEvent::Token(text) => {
                assert!(done.is_none(), "tokens must precede done");
                tokens.push_str(&text);
            }
            PipelineEvent::Done(outcome) => done = Some(outcome),
            PipelineEvent::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }

    let done = done.expect("done event");
    assert_eq!(tokens, "alpha beta gamma");
    assert_eq!(done.answer.text, tokens);
    assert!(!done.answer.sources.is_empty());
}

#[tokio::test]
async fn test_streaming_caches_after_done() {
    let harness = build(HarnessOptions::default());
    harness
        .seed("c1", "beard grooming standards text", "grooming.pdf", 1)
        .await;
    harness.llm.push_response("streamed answer");

    let mut stream = harness
        .orchestrator
        .execute_stream("What are the beard grooming standards?", no_conversation())
        .await
        .unwrap();
    while stream.next().await.is_some() {}

    let hit = harness
        .orchestrator
        .execute("What are the beard grooming standards?", no_conversation())
        .await
        .unwrap();

    assert!(hit.cache_hit);
    assert_eq!(hit.answer.text, "streamed answer");
}

#[tokio::test]
async fn test_simple_mode_forces_simple_strategy() {
    let harness = build(HarnessOptions::default());
    harness
        .seed("c1", "officer and enlisted uniform differences", "uniform.pdf", 1)
        .await;

    harness.llm.push_response("comparison answer");
    let outcome = harness
        .orchestrator
        .execute(
            "Compare the uniform regulations for officers versus enlisted members",
            QueryOptions {
                mode: QueryMode::Simple,
                use_conversation: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.strategy_used.as_str(), "simple");
    // No variant or rerank calls on the forced-simple path.
    assert_eq!(harness.llm.call_count(), 1);
}

#[tokio::test]
async fn test_window_displacement_folds_into_summary() {
    let mut options = HarnessOptions::default();
    options.conversation.window = 3;
    options.conversation.summarize_every = 5;
    let harness = build(options);
    harness
        .seed("c1", "policy chunk text", "policy.pdf", 1)
        .await;

    // Answers for 5 queries, then a summary response at the cadence point.
    for i in 0..5 {
        harness.llm.push_response(&format!("answer {i}"));
    }
    harness.llm.push_response("Summary of displaced exchanges.");

    for i in 0..5 {
        harness
            .orchestrator
            .execute(
                &format!("What does policy section {i} say about uniforms?"),
                QueryOptions::default(),
            )
            .await
            .unwrap();
    }

    let stats = harness.orchestrator.memory().stats();
    assert_eq!(stats.exchanges, 3);
    assert_eq!(stats.summarizations, 1);
}
