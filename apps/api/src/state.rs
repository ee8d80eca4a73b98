use std::sync::Arc;

use crate::config::PipelineSettings;
use crate::extraction::DocumentExtractor;
use crate::llm_client::embeddings::Embedder;
use crate::llm_client::Generator;
use crate::retrieval::{QueryEmbeddingCache, Retriever, VectorIndexCache};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub settings: PipelineSettings,
    pub extractor: Arc<dyn DocumentExtractor>,
    /// Owns the process-wide vector index cache.
    pub retriever: Retriever,
    /// Job description embeddings, memoized by exact text.
    pub query_cache: Arc<QueryEmbeddingCache>,
    pub generator: Arc<dyn Generator>,
}

impl AppState {
    pub fn new(
        settings: PipelineSettings,
        extractor: Arc<dyn DocumentExtractor>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        cache: Arc<VectorIndexCache>,
    ) -> Self {
        let query_cache = Arc::new(QueryEmbeddingCache::new(
            embedder.clone(),
            settings.query_cache_capacity,
        ));
        Self {
            retriever: Retriever::new(cache, embedder),
            query_cache,
            settings,
            extractor,
            generator,
        }
    }
}
