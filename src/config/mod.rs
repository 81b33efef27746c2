//! Environment configuration.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;

/// Cache tuning knobs; see [`Config`] for the matching env names.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Lifetime of exact/normalized entries, seconds.
    pub exact_ttl_sec: u64,

    /// Lifetime of semantic-match candidacy, seconds.
    pub semantic_ttl_sec: u64,

    /// Cosine similarity gate for semantic candidates.
    pub sim_threshold: f32,

    /// Jaccard document-overlap gate for accepting a semantic hit.
    pub overlap_threshold: f32,

    /// Maximum recent entries scanned per semantic lookup.
    pub semantic_candidates: usize,

    /// Disables the semantic stage entirely when false.
    pub enable_semantic: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            exact_ttl_sec: 3600,
            semantic_ttl_sec: 600,
            sim_threshold: 0.98,
            overlap_threshold: 0.80,
            semantic_candidates: 200,
            enable_semantic: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,

    pub bind_addr: IpAddr,

    pub qdrant_url: String,

    /// Qdrant collection holding the chunk index.
    pub collection_name: String,

    /// HTTP embedding backend (TEI-style `/embed` endpoint).
    pub embedding_url: String,

    /// Embedding vector dimension; must match the backend model.
    pub embedding_dim: usize,

    /// OpenAI-compatible completion backend.
    pub llm_url: String,

    pub llm_model: String,

    /// Sparse (BM25) index backend; empty disables sparse retrieval.
    pub sparse_url: String,

    /// Cross-encoder rerank backend; empty disables stage-1 reranking.
    pub cross_encoder_url: String,

    /// Neural reranker backend; empty falls back to LLM reranking.
    pub neural_reranker_url: String,

    pub cache: CacheOptions,

    /// Weight of the cross-encoder score in final rerank fusion.
    pub rerank_alpha: f32,

    /// Generate LLM query variants for complex queries.
    pub enable_query_variants: bool,

    /// Maximum concurrent full pipelines (cache hits excluded).
    pub max_concurrent_pipelines: usize,

    /// Maximum concurrent LLM completions.
    pub max_concurrent_completions: usize,

    /// Overall per-query deadline, seconds.
    pub deadline_sec: u64,

    /// Single LLM call timeout, seconds.
    pub llm_timeout_sec: u64,

    /// Conversation sliding-window size.
    pub conversation_window: usize,

    /// Summarize displaced exchanges every this many additions.
    pub summarize_every: usize,
}

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection_name: "policy_chunks".to_string(),
            embedding_url: "http://localhost:8081".to_string(),
            embedding_dim: crate::constants::DEFAULT_EMBEDDING_DIM,
            llm_url: "http://localhost:11434/v1".to_string(),
            llm_model: "default".to_string(),
            sparse_url: String::new(),
            cross_encoder_url: String::new(),
            neural_reranker_url: String::new(),
            cache: CacheOptions::default(),
            rerank_alpha: 0.7,
            enable_query_variants: true,
            max_concurrent_pipelines: 10,
            max_concurrent_completions: 4,
            deadline_sec: 120,
            llm_timeout_sec: 90,
            conversation_window: 10,
            summarize_every: 5,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "REGENT_PORT";
    const ENV_BIND_ADDR: &'static str = "REGENT_BIND_ADDR";
    const ENV_QDRANT_URL: &'static str = "REGENT_QDRANT_URL";
    const ENV_COLLECTION: &'static str = "REGENT_COLLECTION";
    const ENV_EMBEDDING_URL: &'static str = "REGENT_EMBEDDING_URL";
    const ENV_EMBEDDING_DIM: &'static str = "REGENT_EMBEDDING_DIM";
    const ENV_LLM_URL: &'static str = "REGENT_LLM_URL";
    const ENV_LLM_MODEL: &'static str = "REGENT_LLM_MODEL";
    const ENV_SPARSE_URL: &'static str = "REGENT_SPARSE_URL";
    const ENV_CROSS_ENCODER_URL: &'static str = "REGENT_CROSS_ENCODER_URL";
    const ENV_NEURAL_RERANKER_URL: &'static str = "REGENT_NEURAL_RERANKER_URL";
    const ENV_EXACT_TTL: &'static str = "REGENT_EXACT_TTL_SEC";
    const ENV_SEMANTIC_TTL: &'static str = "REGENT_SEMANTIC_TTL_SEC";
    const ENV_SIM_THRESHOLD: &'static str = "REGENT_SIM_THRESHOLD";
    const ENV_OVERLAP_THRESHOLD: &'static str = "REGENT_OVERLAP_THRESHOLD";
    const ENV_SEMANTIC_CANDIDATES: &'static str = "REGENT_SEMANTIC_CANDIDATES";
    const ENV_ENABLE_SEMANTIC: &'static str = "REGENT_ENABLE_SEMANTIC";
    const ENV_RERANK_ALPHA: &'static str = "REGENT_RERANK_ALPHA";
    const ENV_ENABLE_QUERY_VARIANTS: &'static str = "REGENT_ENABLE_QUERY_VARIANTS";
    const ENV_MAX_PIPELINES: &'static str = "REGENT_MAX_PIPELINES";
    const ENV_MAX_COMPLETIONS: &'static str = "REGENT_MAX_COMPLETIONS";
    const ENV_DEADLINE_SEC: &'static str = "REGENT_DEADLINE_SEC";
    const ENV_LLM_TIMEOUT_SEC: &'static str = "REGENT_LLM_TIMEOUT_SEC";
    const ENV_CONVERSATION_WINDOW: &'static str = "REGENT_CONVERSATION_WINDOW";
    const ENV_SUMMARIZE_EVERY: &'static str = "REGENT_SUMMARIZE_EVERY";

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;

        let cache = CacheOptions {
            exact_ttl_sec: Self::parse_u64_from_env(Self::ENV_EXACT_TTL, defaults.cache.exact_ttl_sec),
            semantic_ttl_sec: Self::parse_u64_from_env(
                Self::ENV_SEMANTIC_TTL,
                defaults.cache.semantic_ttl_sec,
            ),
            sim_threshold: Self::parse_f32_from_env(
                Self::ENV_SIM_THRESHOLD,
                defaults.cache.sim_threshold,
            ),
            overlap_threshold: Self::parse_f32_from_env(
                Self::ENV_OVERLAP_THRESHOLD,
                defaults.cache.overlap_threshold,
            ),
            semantic_candidates: Self::parse_usize_from_env(
                Self::ENV_SEMANTIC_CANDIDATES,
                defaults.cache.semantic_candidates,
            ),
            enable_semantic: Self::parse_bool_from_env(
                Self::ENV_ENABLE_SEMANTIC,
                defaults.cache.enable_semantic,
            ),
        };

        Ok(Self {
            port,
            bind_addr,
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            collection_name: Self::parse_string_from_env(
                Self::ENV_COLLECTION,
                defaults.collection_name,
            ),
            embedding_url: Self::parse_string_from_env(
                Self::ENV_EMBEDDING_URL,
                defaults.embedding_url,
            ),
            embedding_dim: Self::parse_usize_from_env(
                Self::ENV_EMBEDDING_DIM,
                defaults.embedding_dim,
            ),
            llm_url: Self::parse_string_from_env(Self::ENV_LLM_URL, defaults.llm_url),
            llm_model: Self::parse_string_from_env(Self::ENV_LLM_MODEL, defaults.llm_model),
            sparse_url: Self::parse_string_from_env(Self::ENV_SPARSE_URL, defaults.sparse_url),
            cross_encoder_url: Self::parse_string_from_env(
                Self::ENV_CROSS_ENCODER_URL,
                defaults.cross_encoder_url,
            ),
            neural_reranker_url: Self::parse_string_from_env(
                Self::ENV_NEURAL_RERANKER_URL,
                defaults.neural_reranker_url,
            ),
            cache,
            rerank_alpha: Self::parse_f32_from_env(Self::ENV_RERANK_ALPHA, defaults.rerank_alpha),
            enable_query_variants: Self::parse_bool_from_env(
                Self::ENV_ENABLE_QUERY_VARIANTS,
                defaults.enable_query_variants,
            ),
            max_concurrent_pipelines: Self::parse_usize_from_env(
                Self::ENV_MAX_PIPELINES,
                defaults.max_concurrent_pipelines,
            ),
            max_concurrent_completions: Self::parse_usize_from_env(
                Self::ENV_MAX_COMPLETIONS,
                defaults.max_concurrent_completions,
            ),
            deadline_sec: Self::parse_u64_from_env(Self::ENV_DEADLINE_SEC, defaults.deadline_sec),
            llm_timeout_sec: Self::parse_u64_from_env(
                Self::ENV_LLM_TIMEOUT_SEC,
                defaults.llm_timeout_sec,
            ),
            conversation_window: Self::parse_usize_from_env(
                Self::ENV_CONVERSATION_WINDOW,
                defaults.conversation_window,
            ),
            summarize_every: Self::parse_usize_from_env(
                Self::ENV_SUMMARIZE_EVERY,
                defaults.summarize_every,
            ),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.cache.sim_threshold) {
            return Err(ConfigError::OutOfRange {
                name: "sim_threshold",
                value: self.cache.sim_threshold.to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.cache.overlap_threshold) {
            return Err(ConfigError::OutOfRange {
                name: "overlap_threshold",
                value: self.cache.overlap_threshold.to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.rerank_alpha) {
            return Err(ConfigError::OutOfRange {
                name: "rerank_alpha",
                value: self.rerank_alpha.to_string(),
            });
        }

        if self.embedding_dim == 0 {
            return Err(ConfigError::OutOfRange {
                name: "embedding_dim",
                value: "0".to_string(),
            });
        }

        if self.max_concurrent_pipelines == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max_concurrent_pipelines",
                value: "0".to_string(),
            });
        }

        if self.conversation_window == 0 || self.summarize_every == 0 {
            return Err(ConfigError::OutOfRange {
                name: "conversation_window/summarize_every",
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_usize_from_env(var_name: &str, default: usize) -> usize {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_f32_from_env(var_name: &str, default: f32) -> f32 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .ok()
            .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }
}
