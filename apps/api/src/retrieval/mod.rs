// Retrieval layer: chunk → embed → cached flat L2 index → top-k search.
// Embedding goes through llm_client::embeddings; nothing here talks HTTP.

pub mod chunker;
pub mod index_cache;
pub mod query_cache;
pub mod retriever;

use thiserror::Error;

use crate::llm_client::ModelError;

pub use chunker::{ChunkConfig, ChunkConfigError};
pub use index_cache::{CacheKey, SearchHit, VectorIndexCache};
pub use query_cache::QueryEmbeddingCache;
pub use retriever::Retriever;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Invalid chunk configuration: {0}")]
    Config(#[from] ChunkConfigError),

    #[error("No index built for cache key {0}")]
    CacheLookup(CacheKey),

    #[error("Query vector has {actual} dimensions, index has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid embedding vectors: {0}")]
    InvalidVectors(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ModelError),
}
