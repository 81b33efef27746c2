//! Cache correctness scenarios: every hit must be one the full pipeline
//! would agree with, and similarity alone must never be trusted.

mod common;

use common::harness::{Harness, HarnessOptions, build};
use regent::cache::CacheConfig;
use regent::pipeline::QueryOptions;

fn options_no_conversation() -> QueryOptions {
    QueryOptions {
        use_conversation: false,
        ..QueryOptions::default()
    }
}

/// Beard-corpus fixture with pinned geometry: three grooming chunks cluster
/// around the beard-question direction.
async fn beard_harness() -> Harness {
    let harness = build(HarnessOptions::default());

    // Query embeddings: the canonical question and a paraphrase at cosine
    // ~0.994, plus a looser phrasing whose retrieval differs.
    harness.embedder.set_embedding(
        "What are the beard grooming standards?",
        vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    harness.embedder.set_embedding(
        "What are the grooming rules for beards?",
        vec![0.994, 0.109, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    harness.embedder.set_embedding(
        "beard standards for airmen",
        vec![0.984, 0.178, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );

    harness.seed_pinned(
        "c12",
        "beard grooming standards overview",
        "grooming.pdf",
        vec![0.999, 0.02, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    harness.seed_pinned(
        "c44",
        "facial hair must be neatly trimmed",
        "grooming.pdf",
        vec![0.998, 0.05, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    harness.seed_pinned(
        "c71",
        "beard length and shaving waivers",
        "grooming.pdf",
        vec![0.997, 0.07, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );

    harness
}

#[tokio::test]
async fn test_scenario_exact_hit() {
    let harness = beard_harness().await;
    harness.llm.push_response("A1: beards must be neatly groomed.");

    let first = harness
        .orchestrator
        .execute(
            "What are the beard grooming standards?",
            options_no_conversation(),
        )
        .await
        .unwrap();
    assert!(!first.cache_hit);

    let second = harness
        .orchestrator
        .execute(
            "What are the beard grooming standards?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    assert!(second.cache_hit);
    assert_eq!(second.cache_stage.unwrap().as_str(), "exact");
    assert_eq!(second.answer.text, first.answer.text);
    // A replayed answer carries the original citations.
    assert_eq!(second.answer.sources, first.answer.sources);
}

#[tokio::test]
async fn test_scenario_normalized_hit() {
    let harness = beard_harness().await;
    harness.llm.push_response("A1: beards must be neatly groomed.");

    let first = harness
        .orchestrator
        .execute(
            "What are the beard grooming standards?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    let second = harness
        .orchestrator
        .execute(
            "  what are the BEARD grooming standards?  ",
            options_no_conversation(),
        )
        .await
        .unwrap();

    assert!(second.cache_hit);
    assert_eq!(second.cache_stage.unwrap().as_str(), "normalized");
    assert_eq!(second.answer.text, first.answer.text);
}

#[tokio::test]
async fn test_scenario_semantic_hit_validated() {
    let harness = beard_harness().await;
    harness.llm.push_response("A1: beards must be neatly groomed.");

    let first = harness
        .orchestrator
        .execute(
            "What are the beard grooming standards?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    // Different text (misses A and B), cosine ~0.994, and the dense probe
    // returns the same three chunks: validated hit.
    let second = harness
        .orchestrator
        .execute(
            "What are the grooming rules for beards?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    assert!(second.cache_hit, "expected validated semantic hit");
    assert_eq!(second.cache_stage.unwrap().as_str(), "semantic");
    assert_eq!(second.answer.text, first.answer.text);
}

#[tokio::test]
async fn test_scenario_overlap_below_threshold_misses() {
    let harness = beard_harness().await;

    // A fourth chunk close to the paraphrase direction changes its dense
    // set: overlap 3/4 = 0.75 < 0.80 must force a full pipeline run.
    harness.seed_pinned(
        "c88",
        "beard policy appendix for airmen",
        "grooming.pdf",
        vec![0.975, 0.222, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );

    harness.llm.push_response("A1: beards must be neatly groomed.");
    harness
        .orchestrator
        .execute(
            "What are the beard grooming standards?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    harness.llm.push_response("A2: different, freshly generated.");
    let second = harness
        .orchestrator
        .execute("beard standards for airmen", options_no_conversation())
        .await
        .unwrap();

    assert!(!second.cache_hit, "0.75 overlap must not validate");
    assert_eq!(second.answer.text, "A2: different, freshly generated.");
}

#[tokio::test]
async fn test_scenario_spurious_similarity_must_miss() {
    let mut options = HarnessOptions::default();
    // Probe size pinned to the stored set size so the overlap arithmetic is exact.
    options.cache = CacheConfig {
        probe_k: 3,
        ..CacheConfig::default()
    };
    let harness = build(options);

    // Two unrelated topics whose embeddings spuriously align (cosine 0.983).
    harness.embedder.set_embedding(
        "What are social functions?",
        vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    harness.embedder.set_embedding(
        "Can I wear cold weather headbands?",
        vec![0.983, 0.184, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );

    // Social-function chunks sit on the first query's side.
    harness.seed_pinned("s03", "social functions etiquette", "social.pdf", vec![0.9999, -0.0141, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    harness.seed_pinned("s17", "formal dinner conduct", "social.pdf", vec![0.9998, -0.02, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    harness.seed_pinned("s22", "mess dress requirements", "social.pdf", vec![0.9997, -0.0245, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    // Headband chunks hug the second query's direction, so its dense probe
    // returns them rather than the social chunks.
    harness.seed_pinned("h01", "cold weather headband policy", "cold.pdf", vec![0.985, 0.172, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    harness.seed_pinned("h02", "winter accessory guidance", "cold.pdf", vec![0.982, 0.189, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    harness.seed_pinned("h03", "authorized outerwear items", "cold.pdf", vec![0.98, 0.199, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

    harness.llm.push_response("Social functions are official events.");
    harness
        .orchestrator
        .execute("What are social functions?", options_no_conversation())
        .await
        .unwrap();

    harness.llm.push_response("Headbands are authorized in winter.");
    let second = harness
        .orchestrator
        .execute(
            "Can I wear cold weather headbands?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    // High cosine, disjoint documents: the wrong answer must not replay.
    assert!(!second.cache_hit);
    assert_eq!(second.answer.text, "Headbands are authorized in winter.");
}

#[tokio::test]
async fn test_semantic_stage_disabled_by_config() {
    let mut options = HarnessOptions::default();
    options.cache = CacheConfig {
        enable_semantic: false,
        ..CacheConfig::default()
    };
    let harness = build(options);

    harness.embedder.set_embedding(
        "What are the beard grooming standards?",
        vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    harness.embedder.set_embedding(
        "What are the grooming rules for beards?",
        vec![0.994, 0.109, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );
    harness.seed_pinned(
        "c12",
        "beard grooming standards overview",
        "grooming.pdf",
        vec![0.999, 0.02, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    );

    harness.llm.push_response("A1");
    harness
        .orchestrator
        .execute(
            "What are the beard grooming standards?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    harness.llm.push_response("A2");
    let second = harness
        .orchestrator
        .execute(
            "What are the grooming rules for beards?",
            options_no_conversation(),
        )
        .await
        .unwrap();

    assert!(!second.cache_hit);
}

#[tokio::test]
async fn test_cache_stats_reflect_hits() {
    let harness = beard_harness().await;
    harness.llm.push_response("A1");

    let query = "What are the beard grooming standards?";
    harness
        .orchestrator
        .execute(query, options_no_conversation())
        .await
        .unwrap();
    harness
        .orchestrator
        .execute(query, options_no_conversation())
        .await
        .unwrap();

    let stats = harness.orchestrator.cache_stats();
    assert_eq!(stats.puts, 1);
    assert_eq!(stats.exact_hits, 1);
    assert_eq!(stats.misses, 1);
}
