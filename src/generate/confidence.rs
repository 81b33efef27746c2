//! Confidence scoring.
//!
//! Two signals: retrieval quality (computable as soon as retrieval returns,
//! so it runs concurrently with generation) and answer grounding (n-gram
//! overlap between the answer and its top sources, computed afterwards).

use std::collections::HashSet;

use crate::retrieval::RetrievedDocument;

const TOP_DOCS: usize = 3;

fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Retrieval-quality signal in [0, 1].
///
/// Combines the mean of the top-3 final scores, how much of the top-3 slots
/// were filled at all, and whether scoring separated the candidates.
pub fn pre_answer_confidence(documents: &[RetrievedDocument]) -> f32 {
    if documents.is_empty() {
        return 0.0;
    }

    let top: Vec<f32> = documents
        .iter()
        .take(TOP_DOCS)
        .map(|d| clamp01(d.final_score))
        .collect();

    let mean = top.iter().sum::<f32>() / top.len() as f32;
    let coverage = top.len() as f32 / TOP_DOCS as f32;

    let spread = top
        .iter()
        .copied()
        .fold(f32::MIN, f32::max)
        - top.iter().copied().fold(f32::MAX, f32::min);
    let discrimination = clamp01(spread * 2.0);

    clamp01(0.6 * mean + 0.25 * coverage + 0.15 * discrimination)
}

fn word_bigrams(text: &str) -> HashSet<(String, String)> {
    let words: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect();

    words
        .windows(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

/// Grounding signal in [0, 1]: the fraction of the answer's word bigrams
/// that appear in the top source texts.
pub fn post_answer_confidence(answer: &str, documents: &[RetrievedDocument]) -> f32 {
    let answer_bigrams = word_bigrams(answer);
    if answer_bigrams.is_empty() || documents.is_empty() {
        return 0.0;
    }

    let mut source_bigrams: HashSet<(String, String)> = HashSet::new();
    for doc in documents.iter().take(TOP_DOCS) {
        source_bigrams.extend(word_bigrams(&doc.meta.text));
    }

    let grounded = answer_bigrams
        .iter()
        .filter(|b| source_bigrams.contains(b))
        .count();

    clamp01(grounded as f32 / answer_bigrams.len() as f32)
}

/// Final confidence: equal-weight blend of both signals.
pub fn combine_confidence(pre: f32, post: f32) -> f32 {
    clamp01(0.5 * pre + 0.5 * post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectordb::ChunkMeta;

    fn doc(id: &str, text: &str, score: f32) -> RetrievedDocument {
        let mut d = RetrievedDocument::from_dense(
            ChunkMeta {
                chunk_id: id.to_string(),
                text: text.to_string(),
                source_file: "p.pdf".to_string(),
                page: 1,
                chunk_index: 0,
            },
            score,
        );
        d.final_score = score;
        d
    }

    #[test]
    fn test_pre_confidence_empty_is_zero() {
        assert_eq!(pre_answer_confidence(&[]), 0.0);
    }

    #[test]
    fn test_pre_confidence_strong_retrieval() {
        let docs = vec![
            doc("a", "t", 0.95),
            doc("b", "t", 0.6),
            doc("c", "t", 0.4),
        ];
        let pre = pre_answer_confidence(&docs);
        assert!(pre > 0.6, "pre = {pre}");
    }

    #[test]
    fn test_pre_confidence_weak_single_doc() {
        let strong = pre_answer_confidence(&[
            doc("a", "t", 0.95),
            doc("b", "t", 0.9),
            doc("c", "t", 0.5),
        ]);
        let weak = pre_answer_confidence(&[doc("a", "t", 0.2)]);
        assert!(weak < strong);
    }

    #[test]
    fn test_post_confidence_grounded_answer() {
        let docs = vec![doc(
            "a",
            "beards must be neatly trimmed and no longer than two inches",
            0.9,
        )];

        let grounded =
            post_answer_confidence("Beards must be neatly trimmed per policy", &docs);
        let ungrounded =
            post_answer_confidence("Cats enjoy sunny windowsills every afternoon", &docs);

        assert!(grounded > ungrounded);
        assert_eq!(ungrounded, 0.0);
    }

    #[test]
    fn test_post_confidence_empty_inputs() {
        assert_eq!(post_answer_confidence("", &[doc("a", "text here", 0.9)]), 0.0);
        assert_eq!(post_answer_confidence("some answer text", &[]), 0.0);
    }

    #[test]
    fn test_combine_bounds() {
        assert_eq!(combine_confidence(0.0, 0.0), 0.0);
        assert_eq!(combine_confidence(1.0, 1.0), 1.0);
        let mid = combine_confidence(0.8, 0.4);
        assert!((mid - 0.6).abs() < 1e-6);
    }
}
