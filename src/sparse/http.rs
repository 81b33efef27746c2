//! HTTP sparse-index backend (`POST /search`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::SparseIndexError;
use super::{SparseHit, SparseIndex};
use crate::vectordb::ChunkMeta;

#[derive(Serialize)]
struct SparseRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SparseResponseHit {
    chunk_id: String,
    score: f32,
    #[serde(default)]
    text: String,
    #[serde(default)]
    source_file: String,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    chunk_index: u32,
}

/// Keyword index served over HTTP.
#[derive(Clone)]
pub struct HttpSparseIndex {
    http: reqwest::Client,
    url: String,
}

impl HttpSparseIndex {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.url)
    }
}

impl std::fmt::Debug for HttpSparseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSparseIndex")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl SparseIndex for HttpSparseIndex {
    #[instrument(skip(self, query_text), fields(query_len = query_text.len()))]
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<SparseHit>, SparseIndexError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&SparseRequest {
                query: query_text,
                k,
            })
            .send()
            .await
            .map_err(|e| SparseIndexError::Unavailable {
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| SparseIndexError::QueryFailed {
                message: e.to_string(),
            })?;

        let hits: Vec<SparseResponseHit> =
            response
                .json()
                .await
                .map_err(|e| SparseIndexError::QueryFailed {
                    message: e.to_string(),
                })?;

        Ok(hits
            .into_iter()
            .map(|h| SparseHit {
                score: h.score,
                meta: ChunkMeta {
                    chunk_id: h.chunk_id,
                    text: h.text,
                    source_file: h.source_file,
                    page: h.page,
                    chunk_index: h.chunk_index,
                },
            })
            .collect())
    }
}
