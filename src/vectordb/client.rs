use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    PointsIdsList, Range, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};

use super::error::VectorDbError;
use super::model::{ChunkMeta, SearchFilter, SearchHit};
use crate::hashing::hash_to_u64;

/// Abstract dense store over embedded chunks.
///
/// Scores are cosine similarity (higher is better); results are sorted
/// descending. `upsert`/`delete` exist for the ingestion side and are unused
/// by the query pipeline.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// k-NN search with an optional metadata filter.
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, VectorDbError>;

    /// Indexes or replaces one chunk.
    async fn upsert(&self, meta: ChunkMeta, embedding: Vec<f32>) -> Result<(), VectorDbError>;

    /// Removes one chunk.
    async fn delete(&self, chunk_id: &str) -> Result<(), VectorDbError>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<(), VectorDbError>;
}

#[derive(Clone)]
/// Qdrant-backed [`VectorStore`].
pub struct QdrantStore {
    client: std::sync::Arc<Qdrant>,
    url: String,
    collection: String,
}

impl QdrantStore {
    /// Connects to `url` and targets `collection`.
    pub async fn new(url: &str, collection: &str) -> Result<Self, VectorDbError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client: std::sync::Arc::new(client),
            url: url.to_string(),
            collection: collection.to_string(),
        })
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ensures the chunk collection exists with cosine distance.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorDbError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        if !exists {
            let vectors_config = VectorParamsBuilder::new(vector_size, Distance::Cosine);
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(vectors_config)
                        .on_disk_payload(true),
                )
                .await
                .map_err(|e| VectorDbError::CreateCollectionFailed {
                    collection: self.collection.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(())
    }

    fn build_filter(filter: &SearchFilter) -> Filter {
        let mut conditions = Vec::new();

        if let Some(ref source_file) = filter.source_file {
            conditions.push(Condition::matches("source_file", source_file.clone()));
        }

        if let Some((from, to)) = filter.page_range {
            conditions.push(Condition::range(
                "page",
                Range {
                    gte: Some(from as f64),
                    lte: Some(to as f64),
                    ..Default::default()
                },
            ));
        }

        Filter::must(conditions)
    }
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .finish()
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, embedding.to_vec(), k as u64)
                .with_payload(true);

        if let Some(filter) = filter {
            if !filter.is_empty() {
                builder = builder.filter(Self::build_filter(filter));
            }
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(response
            .result
            .into_iter()
            .filter_map(SearchHit::from_scored_point)
            .collect())
    }

    async fn upsert(&self, meta: ChunkMeta, embedding: Vec<f32>) -> Result<(), VectorDbError> {
        let point_id = hash_to_u64(meta.chunk_id.as_bytes());

        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert("chunk_id".to_string(), meta.chunk_id.into());
        payload.insert("text".to_string(), meta.text.into());
        payload.insert("source_file".to_string(), meta.source_file.into());
        payload.insert("page".to_string(), (meta.page as i64).into());
        payload.insert("chunk_index".to_string(), (meta.chunk_index as i64).into());

        let point = PointStruct::new(point_id, embedding, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn delete(&self, chunk_id: &str) -> Result<(), VectorDbError> {
        let point_id = hash_to_u64(chunk_id.as_bytes());

        let points_selector = PointsIdsList {
            ids: vec![point_id.into()],
        };

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(points_selector)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorDbError::DeleteFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}
