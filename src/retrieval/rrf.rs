//! Reciprocal Rank Fusion.
//!
//! `rrf(d) = sum over lists containing d of 1 / (K + rank)`, rank 1-based,
//! K = 60. Ties break on dense rank, then chunk id.

use std::collections::HashMap;

use crate::constants::RRF_K;

use super::types::RetrievedDocument;

struct FusedEntry {
    doc: RetrievedDocument,
    rrf_score: f32,
    votes: usize,
    dense_rank: Option<usize>,
}

/// Fuses a dense and a sparse ranked list into one RRF-ordered list.
///
/// Documents present in both lists carry both per-retriever scores.
pub fn rrf_fuse(
    dense: Vec<RetrievedDocument>,
    sparse: Vec<RetrievedDocument>,
) -> Vec<RetrievedDocument> {
    let mut entries: HashMap<String, FusedEntry> = HashMap::new();

    for (rank, doc) in dense.into_iter().enumerate() {
        let rank = rank + 1;
        let rrf = 1.0 / (RRF_K + rank as f32);
        entries.insert(
            doc.meta.chunk_id.clone(),
            FusedEntry {
                doc,
                rrf_score: rrf,
                votes: 1,
                dense_rank: Some(rank),
            },
        );
    }

    for (rank, doc) in sparse.into_iter().enumerate() {
        let rank = rank + 1;
        let rrf = 1.0 / (RRF_K + rank as f32);
        entries
            .entry(doc.meta.chunk_id.clone())
            .and_modify(|entry| {
                entry.rrf_score += rrf;
                entry.votes += 1;
                entry.doc.sparse_score = doc.sparse_score;
            })
            .or_insert(FusedEntry {
                doc,
                rrf_score: rrf,
                votes: 1,
                dense_rank: None,
            });
    }

    finalize(entries.into_values().collect(), false)
}

/// Fuses several already-fused ranked lists (advanced strategy) by rank-vote
/// first, RRF second: a document surfacing in more variant lists outranks a
/// single high placement.
pub fn fuse_ranked_lists(lists: Vec<Vec<RetrievedDocument>>) -> Vec<RetrievedDocument> {
    let mut entries: HashMap<String, FusedEntry> = HashMap::new();

    for list in lists {
        for (rank, doc) in list.into_iter().enumerate() {
            let rank = rank + 1;
            let rrf = 1.0 / (RRF_K + rank as f32);
            entries
                .entry(doc.meta.chunk_id.clone())
                .and_modify(|entry| {
                    entry.rrf_score += rrf;
                    entry.votes += 1;
                    if entry.doc.dense_score.is_none() {
                        entry.doc.dense_score = doc.dense_score;
                    }
                    if entry.doc.sparse_score.is_none() {
                        entry.doc.sparse_score = doc.sparse_score;
                    }
                })
                .or_insert(FusedEntry {
                    doc,
                    rrf_score: rrf,
                    votes: 1,
                    dense_rank: Some(rank),
                });
        }
    }

    finalize(entries.into_values().collect(), true)
}

fn finalize(mut entries: Vec<FusedEntry>, vote_first: bool) -> Vec<RetrievedDocument> {
    entries.sort_by(|a, b| {
        let by_votes = if vote_first {
            b.votes.cmp(&a.votes)
        } else {
            std::cmp::Ordering::Equal
        };

        by_votes
            .then_with(|| {
                b.rrf_score
                    .partial_cmp(&a.rrf_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| match (a.dense_rank, b.dense_rank) {
                (Some(ar), Some(br)) => ar.cmp(&br),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.doc.meta.chunk_id.cmp(&b.doc.meta.chunk_id))
    });

    entries
        .into_iter()
        .map(|entry| {
            let mut doc = entry.doc;
            doc.final_score = entry.rrf_score;
            doc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectordb::ChunkMeta;

    fn meta(id: &str) -> ChunkMeta {
        ChunkMeta {
            chunk_id: id.to_string(),
            text: format!("text {id}"),
            source_file: "p.pdf".to_string(),
            page: 1,
            chunk_index: 0,
        }
    }

    fn dense_doc(id: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument::from_dense(meta(id), score)
    }

    fn sparse_doc(id: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument::from_sparse(meta(id), score)
    }

    #[test]
    fn test_doc_in_both_lists_wins() {
        let dense = vec![dense_doc("a", 0.9), dense_doc("b", 0.8)];
        let sparse = vec![sparse_doc("b", 12.0), sparse_doc("c", 9.0)];

        let fused = rrf_fuse(dense, sparse);

        assert_eq!(fused[0].meta.chunk_id, "b");
        assert!(fused[0].dense_score.is_some());
        assert!(fused[0].sparse_score.is_some());
    }

    #[test]
    fn test_rrf_score_values() {
        let dense = vec![dense_doc("a", 0.9)];
        let sparse = vec![sparse_doc("a", 5.0)];

        let fused = rrf_fuse(dense, sparse);

        // Rank 1 in both lists: 2 / 61.
        assert!((fused[0].final_score - 2.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_tie_breaks_on_dense_rank() {
        // "a" is dense rank 1, "b" sparse rank 1: equal RRF, dense wins.
        let dense = vec![dense_doc("a", 0.9)];
        let sparse = vec![sparse_doc("b", 5.0)];

        let fused = rrf_fuse(dense, sparse);

        assert_eq!(fused[0].meta.chunk_id, "a");
    }

    #[test]
    fn test_multi_list_vote_dominates() {
        // "x" appears (low) in all three lists; "y" is first in one.
        let lists = vec![
            vec![dense_doc("y", 0.99), dense_doc("x", 0.5)],
            vec![dense_doc("x", 0.5)],
            vec![dense_doc("x", 0.5)],
        ];

        let fused = fuse_ranked_lists(lists);

        assert_eq!(fused[0].meta.chunk_id, "x");
    }

    #[test]
    fn test_empty_lists() {
        assert!(rrf_fuse(vec![], vec![]).is_empty());
        assert!(fuse_ranked_lists(vec![vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_determinism() {
        let build = || {
            rrf_fuse(
                vec![dense_doc("a", 0.9), dense_doc("b", 0.8)],
                vec![sparse_doc("c", 3.0), sparse_doc("a", 2.0)],
            )
        };

        let first: Vec<String> = build().iter().map(|d| d.meta.chunk_id.clone()).collect();
        let second: Vec<String> = build().iter().map(|d| d.meta.chunk_id.clone()).collect();

        assert_eq!(first, second);
    }
}
