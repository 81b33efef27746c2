use qdrant_client::qdrant::ScoredPoint;
use serde::{Deserialize, Serialize};

/// Immutable metadata of an indexed chunk.
///
/// Produced by external ingestion; the core reads it from store payloads and
/// never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Stable chunk id; uniquely identifies the text.
    pub chunk_id: String,
    pub text: String,
    pub source_file: String,
    pub page: u32,
    pub chunk_index: u32,
}

/// One scored dense-retrieval hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f32,
    pub meta: ChunkMeta,
}

impl SearchHit {
    /// Builds a hit from a Qdrant scored point's payload.
    pub fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let payload = point.payload;

        let chunk_id = payload.get("chunk_id")?.as_str()?.to_string();
        let text = payload
            .get("text")
            .and_then(|v| v.as_str())
            .map(|s| s.as_str())
            .unwrap_or_default()
            .to_string();
        let source_file = payload
            .get("source_file")
            .and_then(|v| v.as_str())
            .map(|s| s.as_str())
            .unwrap_or_default()
            .to_string();
        let page = payload
            .get("page")
            .and_then(|v| v.as_integer())
            .unwrap_or(0) as u32;
        let chunk_index = payload
            .get("chunk_index")
            .and_then(|v| v.as_integer())
            .unwrap_or(0) as u32;

        Some(SearchHit {
            score: point.score,
            meta: ChunkMeta {
                chunk_id,
                text,
                source_file,
                page,
                chunk_index,
            },
        })
    }
}

/// Optional restriction on a dense search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub source_file: Option<String>,
    /// Inclusive page bounds.
    pub page_range: Option<(u32, u32)>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.source_file.is_none() && self.page_range.is_none()
    }
}
