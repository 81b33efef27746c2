//! Regent HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use regent::cache::{CacheConfig, MultiStageCache, MultiStageCacheHandle};
use regent::config::Config;
use regent::conversation::{ConversationConfig, ConversationMemory, ConversationMemoryHandle};
use regent::embedding::{BatchingEmbedder, CachedEmbedder, EmbeddingClient, HttpEmbeddingClient};
use regent::gateway::{AppState, create_router};
use regent::generate::{AnswerGenerator, GeneratorConfig};
use regent::llm::{GovernorConfig, HttpLlmClient, LlmClient, RetryingLlmClient};
use regent::pipeline::{Orchestrator, PipelineConfig, retrieval_probe};
use regent::rerank::{
    CrossEncoder, HttpCrossEncoder, HttpNeuralReranker, NeuralReranker, TwoStageConfig,
    TwoStageReranker,
};
use regent::retrieval::{EngineConfig, RetrievalEngine};
use regent::sparse::{HttpSparseIndex, SparseIndex};
use regent::vectordb::{QdrantStore, VectorStore};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
██████╗ ███████╗ ██████╗ ███████╗███╗   ██╗████████╗
██╔══██╗██╔════╝██╔════╝ ██╔════╝████╗  ██║╚══██╔══╝
██████╔╝█████╗  ██║  ███╗█████╗  ██╔██╗ ██║   ██║
██╔══██╗██╔══╝  ██║   ██║██╔══╝  ██║╚██╗██║   ██║
██║  ██║███████╗╚██████╔╝███████╗██║ ╚████║   ██║
╚═╝  ╚═╝╚══════╝ ╚═════╝ ╚══════╝╚═╝  ╚═══╝   ╚═╝

        ASK. GROUND. CITE.
                                        AGPL-3.0
"#
    );

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        qdrant_url = %config.qdrant_url,
        "Regent starting"
    );

    let vector_store = QdrantStore::new(&config.qdrant_url, &config.collection_name).await?;
    vector_store
        .ensure_collection(config.embedding_dim as u64)
        .await?;
    let vector_store: Arc<dyn VectorStore> = Arc::new(vector_store);

    let http_embedder: Arc<dyn EmbeddingClient> = Arc::new(HttpEmbeddingClient::new(
        &config.embedding_url,
        config.embedding_dim,
    ));
    let batching = Arc::new(BatchingEmbedder::new(http_embedder));
    let embedder: Arc<dyn EmbeddingClient> = Arc::new(CachedEmbedder::new(batching));

    let llm: Arc<dyn LlmClient> = Arc::new(RetryingLlmClient::new(
        Arc::new(HttpLlmClient::new(&config.llm_url, &config.llm_model)),
        GovernorConfig {
            max_concurrent: config.max_concurrent_completions,
            call_timeout: Duration::from_secs(config.llm_timeout_sec),
            ..GovernorConfig::default()
        },
    ));

    let sparse_index: Option<Arc<dyn SparseIndex>> = if config.sparse_url.is_empty() {
        tracing::warn!("no sparse index configured, hybrid retrieval runs dense-only");
        None
    } else {
        Some(Arc::new(HttpSparseIndex::new(&config.sparse_url)))
    };

    let cross_encoder: Option<Arc<dyn CrossEncoder>> = if config.cross_encoder_url.is_empty() {
        tracing::warn!("no cross-encoder configured, stage-1 reranking disabled");
        None
    } else {
        Some(Arc::new(HttpCrossEncoder::new(&config.cross_encoder_url)))
    };

    let neural: Option<Arc<dyn NeuralReranker>> = if config.neural_reranker_url.is_empty() {
        None
    } else {
        Some(Arc::new(HttpNeuralReranker::new(
            &config.neural_reranker_url,
        )))
    };

    let reranker = TwoStageReranker::new(
        cross_encoder,
        neural,
        llm.clone(),
        TwoStageConfig {
            alpha: config.rerank_alpha,
            ..TwoStageConfig::default()
        },
    );

    let engine = Arc::new(RetrievalEngine::new(
        embedder.clone(),
        vector_store.clone(),
        sparse_index,
        reranker,
        llm.clone(),
        EngineConfig {
            enable_query_variants: config.enable_query_variants,
            ..EngineConfig::default()
        },
    ));

    let cache = MultiStageCacheHandle::new(MultiStageCache::new(
        retrieval_probe(engine.clone()),
        CacheConfig::from_options(&config.cache),
    ));

    let memory = ConversationMemoryHandle::new(ConversationMemory::new(
        llm.clone(),
        ConversationConfig {
            window: config.conversation_window,
            summarize_every: config.summarize_every,
        },
    ));

    let generator = Arc::new(AnswerGenerator::new(llm, GeneratorConfig::default()));

    let orchestrator = Orchestrator::new(
        cache,
        embedder,
        engine,
        generator,
        memory,
        PipelineConfig {
            deadline: Duration::from_secs(config.deadline_sec),
            max_concurrent: config.max_concurrent_pipelines,
            retry_after_ms: 1_000,
        },
    );

    let state = AppState::new(orchestrator, vector_store);
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining");
}
