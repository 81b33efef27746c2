//! Shared test harness: a full pipeline over mock backends.

use std::sync::Arc;
use std::time::Duration;

use regent::cache::{CacheConfig, MultiStageCache, MultiStageCacheHandle};
use regent::conversation::{ConversationConfig, ConversationMemory, ConversationMemoryHandle};
use regent::embedding::{CachedEmbedder, EmbeddingClient, MockEmbeddingClient};
use regent::generate::{AnswerGenerator, GeneratorConfig};
use regent::llm::MockLlmClient;
use regent::pipeline::{Orchestrator, PipelineConfig, retrieval_probe};
use regent::rerank::{MockCrossEncoder, TwoStageConfig, TwoStageReranker};
use regent::retrieval::{EngineConfig, RetrievalEngine};
use regent::sparse::MockSparseIndex;
use regent::vectordb::{ChunkMeta, MockVectorStore};

pub const DIM: usize = 8;

pub struct HarnessOptions {
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub engine: EngineConfig,
    pub conversation: ConversationConfig,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            pipeline: PipelineConfig {
                deadline: Duration::from_secs(10),
                max_concurrent: 10,
                retry_after_ms: 100,
            },
            engine: EngineConfig::default(),
            conversation: ConversationConfig::default(),
        }
    }
}

pub struct Harness {
    pub embedder: Arc<MockEmbeddingClient>,
    pub store: Arc<MockVectorStore>,
    pub sparse: Arc<MockSparseIndex>,
    pub llm: Arc<MockLlmClient>,
    pub cross_encoder: Arc<MockCrossEncoder>,
    pub orchestrator: Orchestrator,
}

pub fn chunk(id: &str, text: &str, source: &str, page: u32) -> ChunkMeta {
    ChunkMeta {
        chunk_id: id.to_string(),
        text: text.to_string(),
        source_file: source.to_string(),
        page,
        chunk_index: 0,
    }
}

pub fn build(options: HarnessOptions) -> Harness {
    let raw_embedder = Arc::new(MockEmbeddingClient::new(DIM));
    let store = Arc::new(MockVectorStore::new());
    let sparse = Arc::new(MockSparseIndex::new());
    let llm = Arc::new(MockLlmClient::new());
    let cross_encoder = Arc::new(MockCrossEncoder::new());

    let embedder: Arc<dyn EmbeddingClient> = Arc::new(CachedEmbedder::new(raw_embedder.clone()));

    let reranker = TwoStageReranker::new(
        Some(cross_encoder.clone()),
        None,
        llm.clone(),
        TwoStageConfig::default(),
    );

    let engine = Arc::new(RetrievalEngine::new(
        embedder.clone(),
        store.clone(),
        Some(sparse.clone()),
        reranker,
        llm.clone(),
        options.engine,
    ));

    let cache = MultiStageCacheHandle::new(MultiStageCache::new(
        retrieval_probe(engine.clone()),
        options.cache,
    ));

    let memory = ConversationMemoryHandle::new(ConversationMemory::new(
        llm.clone(),
        options.conversation,
    ));

    let generator = Arc::new(AnswerGenerator::new(llm.clone(), GeneratorConfig::default()));

    let orchestrator = Orchestrator::new(
        cache,
        embedder,
        engine,
        generator,
        memory,
        options.pipeline,
    );

    Harness {
        embedder: raw_embedder,
        store,
        sparse,
        llm,
        cross_encoder,
        orchestrator,
    }
}

impl Harness {
    /// Seeds a chunk everywhere, deriving its embedding from its text.
    pub async fn seed(&self, id: &str, text: &str, source: &str, page: u32) {
        let embedding = self.embedder.embed(text).await.unwrap();
        self.store.seed(chunk(id, text, source, page), embedding);
        self.sparse.seed(chunk(id, text, source, page));
    }

    /// Seeds a chunk with a pinned embedding (controlled cosine geometry).
    pub fn seed_pinned(&self, id: &str, text: &str, source: &str, embedding: Vec<f32>) {
        let mut embedding = embedding;
        regent::embedding::unit_normalize(&mut embedding);
        self.store.seed(chunk(id, text, source, 1), embedding);
        self.sparse.seed(chunk(id, text, source, 1));
    }
}
