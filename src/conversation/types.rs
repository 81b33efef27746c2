use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::QueryType;
use crate::retrieval::{RetrievedDocument, Strategy};
use crate::vectordb::ChunkMeta;

/// One completed query/answer turn.
///
/// Chunks are carried with their metadata so prior-turn documents can rejoin
/// a later rerank pool without a refetch.
#[derive(Debug, Clone)]
pub struct ConversationExchange {
    pub query: String,
    pub answer: String,
    pub retrieved_chunks: Vec<ChunkMeta>,
    pub query_type: QueryType,
    pub strategy: Strategy,
    pub timestamp: DateTime<Utc>,
}

impl ConversationExchange {
    /// Ids of the chunks retrieved in this turn.
    pub fn chunk_ids(&self) -> Vec<String> {
        self.retrieved_chunks
            .iter()
            .map(|c| c.chunk_id.clone())
            .collect()
    }
}

/// Context value handed to retrieval for one query.
///
/// Built by the memory from its window plus the current query; retrieval
/// never reaches back into memory state. The original query is untouched:
/// only `retrieval_query` carries folded-in context.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub is_followup: bool,
    /// Context-enhanced query for retrieval; `None` when not a follow-up.
    pub retrieval_query: Option<String>,
    /// Prior-turn documents to merge into the rerank pool.
    pub prior_documents: Vec<RetrievedDocument>,
}

/// Stats surface for the conversation endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConversationStats {
    pub exchanges: usize,
    pub summarizations: u64,
    pub approx_bytes: usize,
}
